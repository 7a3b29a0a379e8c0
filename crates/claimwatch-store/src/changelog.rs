//! Change log store
//!
//! Append-only text file plus its in-memory mirror. New records become
//! visible in memory immediately and are written in batches by `flush`.
//! The file is only rewritten as a whole when the store is dirty, i.e. after
//! retention pruning or a failed append.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use claimwatch_core::{ChangeRecord, ClaimError, ClaimResult, Timestamp};
use claimwatch_time::rewind;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{
    decode_record, encode_record, is_header, read_text, split_records, HistoryWindow,
    CHANGE_LOG_HEADER, RETENTION,
};

/// Counters from loading a change log file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: usize,
    pub pruned: usize,
    pub malformed: usize,
}

/// Durable change log of one session identity
#[derive(Debug)]
pub struct ChangeLog {
    path: PathBuf,
    retention: Duration,
    /// Every retained record, oldest first
    records: RwLock<Vec<ChangeRecord>>,
    /// Records not yet appended to the file
    pending: Mutex<Vec<ChangeRecord>>,
    /// The file no longer matches `records` and needs a full rewrite
    dirty: AtomicBool,
}

impl ChangeLog {
    /// Empty log bound to `path`; nothing is read until `load`
    pub fn new(path: impl Into<PathBuf>, retention: Duration) -> Self {
        ChangeLog {
            path: path.into(),
            retention,
            records: RwLock::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Bind to `path` and load it with the default retention
    pub fn open(path: impl Into<PathBuf>, now: Timestamp) -> ClaimResult<Self> {
        let log = ChangeLog::new(path, RETENTION);
        log.load(now)?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory records with the file contents.
    ///
    /// A missing file is an empty log. Malformed lines (including ones with
    /// invalid UTF-8) are dropped; records older than the retention window
    /// are pruned and mark the store dirty.
    pub fn load(&self, now: Timestamp) -> ClaimResult<LoadStats> {
        let text = read_text(&self.path)?.unwrap_or_default();

        let mut stats = LoadStats::default();
        let mut records = Vec::new();
        for line in split_records(&text) {
            if is_header(line) {
                continue;
            }
            match decode_record(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    stats.malformed += 1;
                    debug!(path = %self.path.display(), error = %err, "dropping malformed change log line");
                }
            }
        }

        let cutoff = rewind(now, self.retention);
        let before = records.len();
        records.retain(|r| r.timestamp >= cutoff);
        stats.pruned = before - records.len();
        stats.loaded = records.len();

        *self.records.write() = records;
        self.pending.lock().clear();
        self.dirty.store(stats.pruned > 0, Ordering::Release);

        if stats.pruned > 0 {
            info!(
                path = %self.path.display(),
                pruned = stats.pruned,
                "pruned change records past retention"
            );
        }
        Ok(stats)
    }

    /// Add a record; visible immediately, written on the next flush
    pub fn append(&self, record: ChangeRecord) {
        self.records.write().push(record.clone());
        self.pending.lock().push(record);
    }

    pub fn extend(&self, records: impl IntoIterator<Item = ChangeRecord>) {
        let records: Vec<_> = records.into_iter().collect();
        if records.is_empty() {
            return;
        }
        self.records.write().extend(records.iter().cloned());
        self.pending.lock().extend(records);
    }

    /// Append all pending records to the file in a single write.
    ///
    /// Returns the number of records written. With nothing pending the file
    /// is not touched. The header is written only to a missing or empty file.
    /// On failure the drained records stay in memory and the store is marked
    /// dirty so the next `save` rewrites them.
    pub fn flush(&self) -> ClaimResult<usize> {
        let batch = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return Ok(0);
        }

        match self.append_to_file(&batch) {
            Ok(()) => {
                debug!(path = %self.path.display(), count = batch.len(), "flushed change records");
                Ok(batch.len())
            }
            Err(err) => {
                self.dirty.store(true, Ordering::Release);
                Err(err)
            }
        }
    }

    fn append_to_file(&self, batch: &[ChangeRecord]) -> ClaimResult<()> {
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| ClaimError::io(&self.path, err))?;
        let needs_header = file
            .metadata()
            .map_err(|err| ClaimError::io(&self.path, err))?
            .len()
            == 0;

        let mut buf = String::new();
        if needs_header {
            buf.push_str(CHANGE_LOG_HEADER);
            buf.push('\n');
        }
        for record in batch {
            buf.push_str(&encode_record(record));
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .map_err(|err| ClaimError::io(&self.path, err))
    }

    /// Rewrite the whole file if the store is dirty. Returns whether it wrote.
    pub fn save(&self) -> ClaimResult<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }

        // Pending records are part of the rewrite
        let mut pending = self.pending.lock();
        let mut buf = String::from(CHANGE_LOG_HEADER);
        buf.push('\n');
        for record in self.records.read().iter() {
            buf.push_str(&encode_record(record));
            buf.push('\n');
        }

        self.ensure_parent()?;
        fs::write(&self.path, buf).map_err(|err| ClaimError::io(&self.path, err))?;
        pending.clear();
        self.dirty.store(false, Ordering::Release);
        info!(path = %self.path.display(), "rewrote change log");
        Ok(true)
    }

    fn ensure_parent(&self) -> ClaimResult<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|err| ClaimError::io(dir, err))
            }
            _ => Ok(()),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of all records, oldest first
    pub fn records(&self) -> Vec<ChangeRecord> {
        self.records.read().clone()
    }

    /// Records inside `window`, newest first
    pub fn records_within(&self, window: HistoryWindow, now: Timestamp) -> Vec<ChangeRecord> {
        let mut records: Vec<_> = self
            .records
            .read()
            .iter()
            .filter(|r| window.contains(r, now))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    /// Drop in-memory state without touching the file
    pub fn clear(&self) {
        self.records.write().clear();
        self.pending.lock().clear();
        self.dirty.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use claimwatch_core::{ChangeType, ChunkPos, Dimension, OwnerId};
    use uuid::Uuid;

    const DAY: u64 = 24 * 60 * 60;

    fn now() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn record_at(at: Timestamp, x: i32) -> ChangeRecord {
        ChangeRecord::new(
            at,
            Some(OwnerId::new(Uuid::from_u128(42))),
            "Builders",
            Dimension::overworld(),
            ChunkPos::new(x, 0),
            ChangeType::Add,
        )
    }

    fn header_count(path: &Path) -> usize {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| *l == CHANGE_LOG_HEADER)
            .count()
    }

    #[test]
    fn test_flush_appends_with_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server-abcd1234.csv");
        let log = ChangeLog::new(&path, RETENTION);

        log.append(record_at(now(), 1));
        assert_eq!(log.flush().unwrap(), 1);
        log.append(record_at(now(), 2));
        log.append(record_at(now(), 3));
        assert_eq!(log.flush().unwrap(), 2);

        assert_eq!(header_count(&path), 1);
        let reloaded = ChangeLog::open(&path, now()).unwrap();
        assert_eq!(reloaded.records(), log.records());
    }

    #[test]
    fn test_empty_flush_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let log = ChangeLog::new(&path, RETENTION);

        assert_eq!(log.flush().unwrap(), 0);
        assert!(!path.exists());

        log.append(record_at(now(), 1));
        log.flush().unwrap();
        let before = fs::read_to_string(&path).unwrap();
        assert_eq!(log.flush().unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(header_count(&path), 1);
    }

    #[test]
    fn test_retention_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let writer = ChangeLog::new(&path, RETENTION);
        writer.append(record_at(rewind(now(), Duration::from_secs(366 * DAY)), 1));
        writer.append(record_at(rewind(now(), Duration::from_secs(364 * DAY)), 2));
        writer.flush().unwrap();

        let log = ChangeLog::new(&path, RETENTION);
        let stats = log.load(now()).unwrap();
        assert_eq!(stats, LoadStats { loaded: 1, pruned: 1, malformed: 0 });
        assert_eq!(log.records()[0].pos, ChunkPos::new(2, 0));
        assert!(log.is_dirty());

        assert!(log.save().unwrap());
        assert!(!log.is_dirty());
        assert!(!log.save().unwrap());
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_malformed_lines_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let good = encode_record(&record_at(now(), 7));
        fs::write(
            &path,
            format!("{CHANGE_LOG_HEADER}\nthis is not a record\n{good}\n2024-01-01T00:00:00,,x,minecraft:overworld\n"),
        )
        .unwrap();

        let log = ChangeLog::new(&path, RETENTION);
        let stats = log.load(now()).unwrap();
        assert_eq!((stats.loaded, stats.malformed), (1, 2));
        assert!(!log.is_dirty());
    }

    #[test]
    fn test_torn_line_drops_only_itself() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut text = format!("{CHANGE_LOG_HEADER}\n{}\n", encode_record(&record_at(now(), 0)));
        text.push_str(&format!(
            "2024-05-01T00:00:00,{},\"Smith, The\n",
            OwnerId::new(Uuid::from_u128(42))
        ));
        for x in 1..=5 {
            text.push_str(&encode_record(&record_at(now(), x)));
            text.push('\n');
        }
        fs::write(&path, text).unwrap();

        let log = ChangeLog::new(&path, RETENTION);
        let stats = log.load(now()).unwrap();
        assert_eq!(stats, LoadStats { loaded: 6, pruned: 0, malformed: 1 });
        let xs: Vec<_> = log.records().iter().map(|r| r.pos.x).collect();
        assert_eq!(xs, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_invalid_utf8_drops_only_its_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut bytes = format!("{CHANGE_LOG_HEADER}\n{}\n", encode_record(&record_at(now(), 1))).into_bytes();
        bytes.extend_from_slice(b"\xff\xfe garbage\n");
        bytes.extend_from_slice(encode_record(&record_at(now(), 2)).as_bytes());
        bytes.push(b'\n');
        fs::write(&path, bytes).unwrap();

        let log = ChangeLog::new(&path, RETENTION);
        let stats = log.load(now()).unwrap();
        assert_eq!((stats.loaded, stats.malformed), (2, 1));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_failed_append_marks_dirty() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be makes the append fail
        let path = dir.path().join("blocked.csv");
        fs::create_dir(&path).unwrap();

        let log = ChangeLog::new(&path, RETENTION);
        log.append(record_at(now(), 1));
        assert!(matches!(log.flush(), Err(ClaimError::Io { .. })));
        assert!(log.is_dirty());
        assert_eq!(log.len(), 1);
        assert_eq!(log.pending_len(), 0);
    }

    #[test]
    fn test_records_within_newest_first() {
        let log = ChangeLog::new("unused.csv", RETENTION);
        log.append(record_at(rewind(now(), Duration::from_secs(2 * DAY)), 1));
        log.append(record_at(rewind(now(), Duration::from_secs(60)), 2));
        log.append(record_at(rewind(now(), Duration::from_secs(30)), 3));

        let recent = log.records_within(HistoryWindow::LastHour, now());
        let xs: Vec<_> = recent.iter().map(|r| r.pos.x).collect();
        assert_eq!(xs, vec![3, 2]);
        assert_eq!(log.records_within(HistoryWindow::Last7Days, now()).len(), 3);
    }
}
