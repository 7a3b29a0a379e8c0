//! Claim tracker service
//!
//! One explicitly constructed instance per client, shared by reference
//! between the event-delivery path and the presentation path. All methods
//! take `&self`; readers only ever receive copies of the live state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use claimwatch_core::{
    ChangeRecord, ChunkCoord, ClaimError, ClaimEvent, ClaimResult, MotionSample, OwnerId,
    OwnerNameResolver, Timestamp,
};
use claimwatch_state::{ChunkOwnershipCache, DataLossVerdict, OwnershipSnapshot};
use claimwatch_store::{ChangeLog, SessionFiles, SessionIdentity, SnapshotFile};
use claimwatch_time::Clock;
use claimwatch_visual::HighlightDecay;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{SyncCoordinator, SyncPhase, SyncProgress, TrackerConfig, Transition};

/// Summary handed to sync-completion listeners
#[derive(Clone, Debug)]
pub struct SyncReport {
    pub session: SessionIdentity,
    pub completed_at: Timestamp,
    /// Claims in the cache when the sync completed
    pub claims: usize,
    pub added: u32,
    pub removed: u32,
    pub transferred: u32,
    pub verdict: DataLossVerdict,
}

/// Callback fired once per session when the initial sync completes
pub type SyncListener = Arc<dyn Fn(&SyncReport) + Send + Sync>;

/// Point-in-time view of the tracker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerStatus {
    pub phase: SyncPhase,
    pub session: Option<SessionIdentity>,
    pub afk: bool,
    pub cached_claims: usize,
    pub logged_records: usize,
    pub pending_records: usize,
    pub events_seen: u64,
    pub records_emitted: u64,
    pub io_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    events: AtomicU64,
    records: AtomicU64,
    io_failures: AtomicU64,
}

struct ActiveSession {
    identity: SessionIdentity,
    files: SessionFiles,
    coordinator: SyncCoordinator,
    log: Arc<ChangeLog>,
    snapshot: SnapshotFile,
}

/// Tracks claim ownership for the current session
pub struct ClaimTracker {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    names: Arc<dyn OwnerNameResolver>,
    cache: Arc<ChunkOwnershipCache>,
    highlights: Arc<HighlightDecay>,
    session: Mutex<Option<ActiveSession>>,
    listeners: Mutex<Vec<SyncListener>>,
    counters: Counters,
}

impl ClaimTracker {
    pub fn new(
        config: TrackerConfig,
        clock: Arc<dyn Clock>,
        names: Arc<dyn OwnerNameResolver>,
    ) -> Self {
        let highlights = Arc::new(HighlightDecay::new(config.highlight.clone()));
        ClaimTracker {
            config,
            clock,
            names,
            cache: Arc::new(ChunkOwnershipCache::new()),
            highlights,
            session: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn names(&self) -> &dyn OwnerNameResolver {
        self.names.as_ref()
    }

    /// Register a sync-completion listener
    pub fn on_sync_complete(&self, listener: impl Fn(&SyncReport) + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    /// Enter a session and start the initial sync.
    ///
    /// Leaves any active session first. Does nothing when tracking is
    /// disabled. Unreadable files are reported and treated as empty.
    pub fn join(&self, identity: SessionIdentity) {
        self.leave();
        if !self.config.tracking_enabled {
            info!(session = %identity.file_stem(), "tracking disabled; not joining");
            return;
        }

        let now = self.now();
        let files = self.config.storage.files_for(&identity);
        let snapshot = SnapshotFile::new(&files.snapshot);
        let baseline = snapshot.load().unwrap_or_else(|err| {
            self.io_failure(&err, "loading snapshot");
            OwnershipSnapshot::new()
        });

        let log = ChangeLog::new(&files.change_log, self.config.retention);
        if let Err(err) = log.load(now) {
            self.io_failure(&err, "loading change log");
        }

        let mut coordinator = SyncCoordinator::new(
            Arc::clone(&self.cache),
            self.config.sync_window.clone(),
            self.config.activity.clone(),
            self.config.safety.clone(),
            now,
        );
        coordinator.begin(baseline, now);
        self.highlights.clear();

        info!(
            session = %identity.file_stem(),
            baseline = coordinator.baseline().total(),
            history = log.len(),
            "joined session; syncing"
        );
        *self.session.lock() = Some(ActiveSession {
            identity,
            files,
            coordinator,
            log: Arc::new(log),
            snapshot,
        });
    }

    /// End the current session. Returns the identity that was active.
    ///
    /// The snapshot is only persisted when the session reached STEADY, so an
    /// interrupted sync never becomes the next baseline.
    pub fn leave(&self) -> Option<SessionIdentity> {
        let mut session = self.session.lock().take()?;
        let phase = session.coordinator.end();

        if phase == SyncPhase::Steady {
            if let Err(err) = session.snapshot.save(&self.cache.snapshot()) {
                self.io_failure(&err, "saving snapshot");
            }
        }
        if let Err(err) = session.log.flush() {
            self.io_failure(&err, "flushing change log");
        }
        if let Err(err) = session.log.save() {
            self.io_failure(&err, "rewriting change log");
        }

        self.cache.clear();
        self.highlights.clear();
        info!(session = %session.identity.file_stem(), %phase, "left session");
        Some(session.identity)
    }

    /// Apply one ownership event. Returns the change records it produced.
    pub fn on_chunk_update(&self, event: ClaimEvent) -> ClaimResult<Vec<ChangeRecord>> {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return Ok(Vec::new());
        };

        let now = self.clock.now();
        self.counters.events.fetch_add(1, Ordering::Relaxed);
        let transition = session.coordinator.apply(&event, now).map_err(|err| {
            warn!(error = %err, "ignoring ownership event");
            err
        })?;
        if transition == Transition::None {
            return Ok(Vec::new());
        }

        let records = transition.records(&event, now, self.names.as_ref());
        debug!(?transition, dimension = %event.dimension, pos = %event.pos, "ownership changed");
        session.log.extend(records.iter().cloned());
        self.counters
            .records
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        if let Err(err) = session.log.flush() {
            self.io_failure(&err, "flushing change log");
        }
        Ok(records)
    }

    /// Periodic driver: AFK re-check and sync completion.
    ///
    /// Returns the report when this tick completed the initial sync.
    pub fn tick(&self) -> Option<SyncReport> {
        let now = self.clock.now();
        let report = {
            let mut guard = self.session.lock();
            let session = guard.as_mut()?;
            if session.coordinator.poll(now) != SyncProgress::Ready {
                return None;
            }
            self.complete_sync(session, now)?
        };

        // Listeners run without the session lock so they may call back in
        let listeners: Vec<SyncListener> = self.listeners.lock().clone();
        for listener in listeners {
            listener(&report);
        }
        Some(report)
    }

    fn complete_sync(&self, session: &mut ActiveSession, now: Timestamp) -> Option<SyncReport> {
        if let Err(err) = session.snapshot.ensure_exists() {
            self.io_failure(&err, "creating snapshot");
        }

        let result = session.coordinator.complete(now, self.names.as_ref())?;

        if !result.records.is_empty() {
            self.counters
                .records
                .fetch_add(result.records.len() as u64, Ordering::Relaxed);
            session.log.extend(result.records);
            if let Err(err) = session.log.flush() {
                self.io_failure(&err, "flushing change log");
            }
        }
        if let Err(err) = session.snapshot.save(&self.cache.snapshot()) {
            self.io_failure(&err, "saving snapshot");
        }

        Some(SyncReport {
            session: session.identity.clone(),
            completed_at: now,
            claims: self.cache.total_claims(),
            added: result.added,
            removed: result.removed,
            transferred: result.transferred,
            verdict: result.verdict,
        })
    }

    /// Feed a player motion sample
    pub fn observe_motion(&self, sample: MotionSample) {
        let now = self.clock.now();
        if let Some(session) = self.session.lock().as_mut() {
            if let Some(change) = session.coordinator.observe_motion(sample, now) {
                info!(?change, "player activity changed");
            }
        }
    }

    /// Flush pending records and rewrite a dirty log now.
    ///
    /// Returns how many records were appended; zero without a session.
    pub fn force_flush(&self) -> ClaimResult<usize> {
        let Some(log) = self.change_log() else {
            return Ok(0);
        };
        let written = log.flush().map_err(|err| {
            self.counters.io_failures.fetch_add(1, Ordering::Relaxed);
            err
        })?;
        log.save()?;
        Ok(written)
    }

    pub fn phase(&self) -> SyncPhase {
        self.session
            .lock()
            .as_ref()
            .map_or(SyncPhase::Inactive, |s| s.coordinator.phase())
    }

    pub fn is_tracking(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn is_syncing(&self) -> bool {
        self.phase() == SyncPhase::Syncing
    }

    pub fn is_afk(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .map_or(false, |s| s.coordinator.is_afk())
    }

    /// Seconds left in the sync window, while syncing
    pub fn remaining_sync_secs(&self) -> Option<u64> {
        let now = self.clock.now();
        self.session
            .lock()
            .as_ref()
            .and_then(|s| s.coordinator.remaining_secs(now))
    }

    pub fn session(&self) -> Option<SessionIdentity> {
        self.session.lock().as_ref().map(|s| s.identity.clone())
    }

    pub fn session_files(&self) -> Option<SessionFiles> {
        self.session.lock().as_ref().map(|s| s.files.clone())
    }

    pub fn status(&self) -> TrackerStatus {
        let guard = self.session.lock();
        let session = guard.as_ref();
        TrackerStatus {
            phase: session.map_or(SyncPhase::Inactive, |s| s.coordinator.phase()),
            session: session.map(|s| s.identity.clone()),
            afk: session.map_or(false, |s| s.coordinator.is_afk()),
            cached_claims: self.cache.total_claims(),
            logged_records: session.map_or(0, |s| s.log.len()),
            pending_records: session.map_or(0, |s| s.log.pending_len()),
            events_seen: self.counters.events.load(Ordering::Relaxed),
            records_emitted: self.counters.records.load(Ordering::Relaxed),
            io_failures: self.counters.io_failures.load(Ordering::Relaxed),
        }
    }

    /// Copy of the live ownership table
    pub fn cache(&self) -> OwnershipSnapshot {
        self.cache.snapshot()
    }

    pub fn claims_by_owner(&self) -> HashMap<OwnerId, Vec<ChunkCoord>> {
        self.cache.claims_by_owner()
    }

    pub fn claims_of(&self, owner: OwnerId) -> Vec<ChunkCoord> {
        self.cache.claims_of(owner, None)
    }

    /// Change log of the active session
    pub fn change_log(&self) -> Option<Arc<ChangeLog>> {
        self.session.lock().as_ref().map(|s| Arc::clone(&s.log))
    }

    pub fn highlights(&self) -> Arc<HighlightDecay> {
        Arc::clone(&self.highlights)
    }

    fn io_failure(&self, err: &ClaimError, action: &str) {
        self.counters.io_failures.fetch_add(1, Ordering::Relaxed);
        warn!(error = %err, "{action} failed; keeping in-memory state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use claimwatch_core::{ChangeType, ChunkPos, Dimension, PlaceholderNames};
    use claimwatch_time::ManualClock;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn t0() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn owner(n: u128) -> OwnerId {
        OwnerId::new(Uuid::from_u128(n))
    }

    fn identity() -> SessionIdentity {
        SessionIdentity::new(Uuid::from_u128(77), false, Some("play.example.net".into()))
    }

    fn tracker(dir: &TempDir) -> (ClaimTracker, ManualClock) {
        let clock = ManualClock::new(t0());
        let names = |id: OwnerId| (id == owner(1)).then(|| "Builders".to_string());
        let tracker = ClaimTracker::new(
            TrackerConfig::with_base_dir(dir.path()),
            Arc::new(clock.clone()),
            Arc::new(names),
        );
        (tracker, clock)
    }

    fn claim(x: i32, holder: u128) -> ClaimEvent {
        ClaimEvent::claimed(Dimension::overworld(), ChunkPos::new(x, 0), owner(holder))
    }

    fn sync(tracker: &ClaimTracker, clock: &ManualClock) -> SyncReport {
        clock.advance(Duration::from_secs(11));
        tracker.tick().expect("sync should complete")
    }

    #[test]
    fn test_sync_then_steady_records() {
        let dir = TempDir::new().unwrap();
        let (tracker, clock) = tracker(&dir);
        tracker.join(identity());
        assert!(tracker.is_syncing());

        assert!(tracker.on_chunk_update(claim(0, 1)).unwrap().is_empty());
        let report = sync(&tracker, &clock);
        assert_eq!(report.added, 1);
        assert_eq!(tracker.phase(), SyncPhase::Steady);

        let records = tracker.on_chunk_update(claim(0, 2)).unwrap();
        let kinds: Vec<_> = records.iter().map(|r| r.change).collect();
        assert_eq!(kinds, vec![ChangeType::Remove, ChangeType::Add]);
        assert_eq!(records[0].owner_name, "Builders");

        let log = tracker.change_log().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.pending_len(), 0);
        assert!(tracker.session_files().unwrap().change_log.exists());
    }

    #[test]
    fn test_no_tick_before_window() {
        let dir = TempDir::new().unwrap();
        let (tracker, clock) = tracker(&dir);
        tracker.join(identity());
        clock.advance(Duration::from_secs(4));
        assert!(tracker.tick().is_none());
        assert_eq!(tracker.remaining_sync_secs(), Some(6));
    }

    #[test]
    fn test_tracking_disabled() {
        let dir = TempDir::new().unwrap();
        let tracker = ClaimTracker::new(
            TrackerConfig::with_base_dir(dir.path()).tracking(false),
            Arc::new(ManualClock::new(t0())),
            Arc::new(PlaceholderNames),
        );
        tracker.join(identity());
        assert!(!tracker.is_tracking());
        assert!(tracker.on_chunk_update(claim(0, 1)).unwrap().is_empty());
        assert_eq!(tracker.force_flush().unwrap(), 0);
    }

    #[test]
    fn test_snapshot_saved_only_when_steady() {
        let dir = TempDir::new().unwrap();
        let (tracker, clock) = tracker(&dir);
        tracker.join(identity());
        tracker.on_chunk_update(claim(0, 1)).unwrap();
        let files = tracker.session_files().unwrap();
        assert_eq!(tracker.leave(), Some(identity()));
        assert!(!files.snapshot.exists());
        assert!(tracker.cache().is_empty());

        tracker.join(identity());
        tracker.on_chunk_update(claim(0, 1)).unwrap();
        sync(&tracker, &clock);
        tracker.on_chunk_update(claim(1, 1)).unwrap();
        tracker.leave();

        let saved = SnapshotFile::new(&files.snapshot).load().unwrap();
        assert_eq!(saved.total(), 2);
    }

    #[test]
    fn test_rejoin_reconciles_offline_changes() {
        let dir = TempDir::new().unwrap();
        let (tracker, clock) = tracker(&dir);
        tracker.join(identity());
        tracker.on_chunk_update(claim(0, 1)).unwrap();
        tracker.on_chunk_update(claim(1, 1)).unwrap();
        sync(&tracker, &clock);
        tracker.leave();

        clock.advance(Duration::from_secs(3600));
        tracker.join(identity());
        tracker.on_chunk_update(claim(0, 2)).unwrap();
        let report = sync(&tracker, &clock);
        assert_eq!(report.transferred, 1);
        assert_eq!(report.removed, 1);
        assert!(!report.verdict.is_global_loss());
    }

    #[test]
    fn test_listener_fires_once() {
        let dir = TempDir::new().unwrap();
        let (tracker, clock) = tracker(&dir);
        let fired = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&fired);
        tracker.on_sync_complete(move |report| {
            assert_eq!(report.claims, 0);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        tracker.join(identity());
        sync(&tracker, &clock);
        clock.advance(Duration::from_secs(30));
        assert!(tracker.tick().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_event_counted_not_recorded() {
        let dir = TempDir::new().unwrap();
        let (tracker, clock) = tracker(&dir);
        tracker.join(identity());
        sync(&tracker, &clock);

        let bad = ClaimEvent {
            dimension: Dimension::overworld(),
            pos: ChunkPos::new(0, 0),
            claimed: true,
            owner: None,
        };
        assert!(tracker.on_chunk_update(bad).is_err());
        let status = tracker.status();
        assert_eq!(status.events_seen, 1);
        assert_eq!(status.records_emitted, 0);
        assert_eq!(status.phase, SyncPhase::Steady);
    }

    #[test]
    fn test_write_failure_keeps_records_in_memory() {
        let dir = TempDir::new().unwrap();
        let (tracker, clock) = tracker(&dir);
        tracker.join(identity());
        sync(&tracker, &clock);

        let files = tracker.session_files().unwrap();
        std::fs::remove_file(&files.change_log).ok();
        std::fs::create_dir_all(&files.change_log).unwrap();

        let records = tracker.on_chunk_update(claim(4, 1)).unwrap();
        assert_eq!(records.len(), 1);
        assert!(tracker.status().io_failures >= 1);
        assert_eq!(tracker.change_log().unwrap().len(), 1);
    }
}
