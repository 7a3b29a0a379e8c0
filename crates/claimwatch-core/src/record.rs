//! Change records - immutable entries of the ownership history

use std::fmt;

use chrono::NaiveDateTime;

use crate::{ChunkCoord, ChunkPos, Dimension, OwnerId};

/// Local wall-clock time attached to every record
pub type Timestamp = NaiveDateTime;

/// Kind of ownership transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeType {
    /// Initial observed state, not a detected transition
    Baseline,
    Add,
    Remove,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Baseline => "BASELINE",
            ChangeType::Add => "ADD",
            ChangeType::Remove => "REMOVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "BASELINE" => Some(ChangeType::Baseline),
            "ADD" => Some(ChangeType::Add),
            "REMOVE" => Some(ChangeType::Remove),
            _ => None,
        }
    }

    /// Whether the record takes part in add/remove statistics
    #[inline]
    pub fn is_counted(self) -> bool {
        !matches!(self, ChangeType::Baseline)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ownership transition, appended once and never mutated
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRecord {
    pub timestamp: Timestamp,
    pub owner: Option<OwnerId>,
    /// Owner display name at the time of recording
    pub owner_name: String,
    pub dimension: Dimension,
    pub pos: ChunkPos,
    pub change: ChangeType,
}

impl ChangeRecord {
    pub fn new(
        timestamp: Timestamp,
        owner: Option<OwnerId>,
        owner_name: impl Into<String>,
        dimension: Dimension,
        pos: ChunkPos,
        change: ChangeType,
    ) -> Self {
        ChangeRecord {
            timestamp,
            owner,
            owner_name: owner_name.into(),
            dimension,
            pos,
            change,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.dimension.clone(), self.pos)
    }
}

/// Added/removed tally; BASELINE records are never counted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeCount {
    pub added: u32,
    pub removed: u32,
}

impl ChangeCount {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a ChangeRecord>) -> Self {
        let mut count = ChangeCount::default();
        for record in records {
            count.record(record.change);
        }
        count
    }

    #[inline]
    pub fn record(&mut self, change: ChangeType) {
        match change {
            ChangeType::Add => self.added += 1,
            ChangeType::Remove => self.removed += 1,
            ChangeType::Baseline => {}
        }
    }

    #[inline]
    pub fn total(&self) -> u32 {
        self.added + self.removed
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn record(change: ChangeType) -> ChangeRecord {
        ChangeRecord::new(ts(), None, "", Dimension::overworld(), ChunkPos::new(0, 0), change)
    }

    #[test]
    fn test_change_type_names() {
        for change in [ChangeType::Baseline, ChangeType::Add, ChangeType::Remove] {
            assert_eq!(ChangeType::parse(change.as_str()), Some(change));
        }
        assert_eq!(ChangeType::parse("add"), None);
    }

    #[test]
    fn test_tally_skips_baseline() {
        let records = vec![
            record(ChangeType::Add),
            record(ChangeType::Add),
            record(ChangeType::Remove),
            record(ChangeType::Baseline),
        ];
        let count = ChangeCount::tally(&records);
        assert_eq!(count, ChangeCount { added: 2, removed: 1 });
        assert_eq!(count.total(), 3);
    }
}
