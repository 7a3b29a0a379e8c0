//! History queries over loaded change records

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use claimwatch_core::{ChangeRecord, OwnerId, Timestamp, UNKNOWN_OWNER};
use claimwatch_time::elapsed;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

/// Default retention of the change log
pub const RETENTION: Duration = Duration::from_secs(365 * DAY);

/// Selectable history range, cycled through by the presentation layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HistoryWindow {
    LastHour,
    #[default]
    Last24Hours,
    Last7Days,
    Last30Days,
    AllTime,
}

impl HistoryWindow {
    const ALL: [HistoryWindow; 5] = [
        HistoryWindow::LastHour,
        HistoryWindow::Last24Hours,
        HistoryWindow::Last7Days,
        HistoryWindow::Last30Days,
        HistoryWindow::AllTime,
    ];

    /// Span covered; `AllTime` is bounded by the retention window
    pub fn span(self) -> Duration {
        match self {
            HistoryWindow::LastHour => Duration::from_secs(HOUR),
            HistoryWindow::Last24Hours => Duration::from_secs(DAY),
            HistoryWindow::Last7Days => Duration::from_secs(7 * DAY),
            HistoryWindow::Last30Days => Duration::from_secs(30 * DAY),
            HistoryWindow::AllTime => RETENTION,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HistoryWindow::LastHour => "Last hour",
            HistoryWindow::Last24Hours => "Last 24 hours",
            HistoryWindow::Last7Days => "Last 7 days",
            HistoryWindow::Last30Days => "Last 30 days",
            HistoryWindow::AllTime => "All time",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|w| *w == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Whether a record falls inside this window ending at `now`.
    ///
    /// Records stamped in the future (clock moved back) count as inside.
    pub fn contains(self, record: &ChangeRecord, now: Timestamp) -> bool {
        elapsed(record.timestamp, now) <= self.span()
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Age section for grouping records in history views
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeBucket {
    Past24Hours,
    Past7Days,
    Past30Days,
    Older,
}

impl AgeBucket {
    pub fn of(record: &ChangeRecord, now: Timestamp) -> Self {
        let age = elapsed(record.timestamp, now).as_secs();
        if age < DAY {
            AgeBucket::Past24Hours
        } else if age < 7 * DAY {
            AgeBucket::Past7Days
        } else if age < 30 * DAY {
            AgeBucket::Past30Days
        } else {
            AgeBucket::Older
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgeBucket::Past24Hours => "Past 24 hours",
            AgeBucket::Past7Days => "Past 7 days",
            AgeBucket::Past30Days => "Past 30 days",
            AgeBucket::Older => "Older",
        }
    }
}

/// Split records into age buckets, youngest bucket first, keeping order within each
pub fn bucket_by_age(records: &[ChangeRecord], now: Timestamp) -> Vec<(AgeBucket, Vec<ChangeRecord>)> {
    let mut buckets: Vec<(AgeBucket, Vec<ChangeRecord>)> = Vec::new();
    for record in records {
        let bucket = AgeBucket::of(record, now);
        match buckets.iter_mut().find(|(b, _)| *b == bucket) {
            Some((_, list)) => list.push(record.clone()),
            None => buckets.push((bucket, vec![record.clone()])),
        }
    }
    buckets.sort_by_key(|(bucket, _)| *bucket);
    buckets
}

/// All recorded changes of one owner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerHistory {
    pub owner: OwnerId,
    /// Most recent non-empty display name
    pub current_name: String,
    /// Earlier distinct names, in first-seen order
    pub old_names: Vec<String>,
    /// Records in chronological order
    pub records: Vec<ChangeRecord>,
}

impl OwnerHistory {
    pub fn last_change(&self) -> Option<Timestamp> {
        self.records.last().map(|r| r.timestamp)
    }
}

/// Group records by owner.
///
/// Records without an owner are skipped. Histories are ordered by their most
/// recent change, newest first.
pub fn group_by_owner(records: &[ChangeRecord]) -> Vec<OwnerHistory> {
    let mut by_owner: HashMap<OwnerId, Vec<ChangeRecord>> = HashMap::new();
    for record in records {
        if let Some(owner) = record.owner {
            by_owner.entry(owner).or_default().push(record.clone());
        }
    }

    let mut histories: Vec<OwnerHistory> = by_owner
        .into_iter()
        .map(|(owner, mut records)| {
            records.sort_by_key(|r| r.timestamp);

            let current_name = records
                .iter()
                .rev()
                .map(|r| r.owner_name.trim())
                .find(|name| !name.is_empty())
                .unwrap_or(UNKNOWN_OWNER)
                .to_string();

            let mut old_names: Vec<String> = Vec::new();
            for record in &records {
                let name = record.owner_name.trim();
                if !name.is_empty() && name != current_name && !old_names.iter().any(|n| n == name) {
                    old_names.push(name.to_string());
                }
            }

            OwnerHistory {
                owner,
                current_name,
                old_names,
                records,
            }
        })
        .collect();

    histories.sort_by(|a, b| {
        b.last_change()
            .cmp(&a.last_change())
            .then_with(|| a.owner.cmp(&b.owner))
    });
    histories
}
