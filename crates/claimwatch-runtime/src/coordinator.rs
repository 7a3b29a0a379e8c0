//! Sync coordinator - the per-session state machine
//!
//! INACTIVE -> SYNCING -> STEADY
//!
//! While syncing, events only fill the cache. Once the sync window elapses
//! (never while the player is AFK) the coordinator turns steady, reconciles
//! the baseline against the cache exactly once, and from then on reports a
//! transition for every event. The coordinator does no I/O.

use std::fmt;
use std::sync::Arc;

use claimwatch_core::{
    display_name, ChangeRecord, ChangeType, ClaimEvent, ClaimResult, MotionSample, OwnerId,
    OwnerNameResolver, Timestamp,
};
use claimwatch_state::{
    ChunkOwnershipCache, OfflineDiffReconciler, OwnershipSnapshot, ReconciliationResult,
    SafetyThresholds,
};
use claimwatch_time::{
    ActivityConfig, ActivityMonitor, AfkChange, SyncWindow, SyncWindowConfig, WindowState,
};
use tracing::{debug, info};

/// Session phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Inactive,
    Syncing,
    Steady,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncPhase::Inactive => "INACTIVE",
            SyncPhase::Syncing => "SYNCING",
            SyncPhase::Steady => "STEADY",
        })
    }
}

/// Ownership change caused by one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed, or the event was absorbed by the initial sync
    None,
    Added(OwnerId),
    Removed(OwnerId),
    Transferred { from: OwnerId, to: OwnerId },
}

impl Transition {
    pub fn between(before: Option<OwnerId>, after: Option<OwnerId>) -> Self {
        match (before, after) {
            (None, Some(to)) => Transition::Added(to),
            (Some(from), None) => Transition::Removed(from),
            (Some(from), Some(to)) if from != to => Transition::Transferred { from, to },
            _ => Transition::None,
        }
    }

    /// Change records for this transition; a transfer yields REMOVE then ADD
    pub fn records(
        &self,
        event: &ClaimEvent,
        now: Timestamp,
        names: &dyn OwnerNameResolver,
    ) -> Vec<ChangeRecord> {
        let record = |owner: OwnerId, change: ChangeType| {
            ChangeRecord::new(
                now,
                Some(owner),
                display_name(names, Some(owner)),
                event.dimension.clone(),
                event.pos,
                change,
            )
        };
        match *self {
            Transition::None => Vec::new(),
            Transition::Added(owner) => vec![record(owner, ChangeType::Add)],
            Transition::Removed(owner) => vec![record(owner, ChangeType::Remove)],
            Transition::Transferred { from, to } => {
                vec![record(from, ChangeType::Remove), record(to, ChangeType::Add)]
            }
        }
    }
}

/// Outcome of polling the sync window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncProgress {
    /// Not syncing
    Idle,
    /// Window still open
    Waiting { remaining_secs: u64 },
    /// Window stretched because a dimension looks wiped
    Extended,
    /// Player is AFK; completion is deferred
    Paused,
    /// Window elapsed; `complete` should be called
    Ready,
}

/// Per-session state machine
#[derive(Debug)]
pub struct SyncCoordinator {
    phase: SyncPhase,
    cache: Arc<ChunkOwnershipCache>,
    window: SyncWindow,
    activity: ActivityMonitor,
    reconciler: OfflineDiffReconciler,
    /// Previous session's table, consumed by reconciliation
    baseline: OwnershipSnapshot,
}

impl SyncCoordinator {
    pub fn new(
        cache: Arc<ChunkOwnershipCache>,
        window: SyncWindowConfig,
        activity: ActivityConfig,
        safety: SafetyThresholds,
        now: Timestamp,
    ) -> Self {
        SyncCoordinator {
            phase: SyncPhase::Inactive,
            cache,
            window: SyncWindow::new(window, now),
            activity: ActivityMonitor::new(activity, now),
            reconciler: OfflineDiffReconciler::new(safety),
            baseline: OwnershipSnapshot::new(),
        }
    }

    /// Start syncing a new session against `baseline`
    pub fn begin(&mut self, baseline: OwnershipSnapshot, now: Timestamp) {
        self.cache.clear();
        self.window.reset(now);
        self.activity.reset(now);
        self.baseline = baseline;
        self.phase = SyncPhase::Syncing;
        debug!(baseline = self.baseline.total(), "sync window opened");
    }

    /// Return to INACTIVE, dropping the baseline. The cache is left to the owner.
    pub fn end(&mut self) -> SyncPhase {
        let previous = self.phase;
        self.phase = SyncPhase::Inactive;
        self.baseline = OwnershipSnapshot::new();
        previous
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn is_afk(&self) -> bool {
        self.activity.is_afk()
    }

    pub fn baseline(&self) -> &OwnershipSnapshot {
        &self.baseline
    }

    /// Seconds until the window closes, while syncing
    pub fn remaining_secs(&self, now: Timestamp) -> Option<u64> {
        (self.phase == SyncPhase::Syncing).then(|| self.window.remaining_secs(now))
    }

    pub fn events_during_sync(&self) -> u64 {
        self.window.events()
    }

    /// Apply an ownership event to the cache.
    ///
    /// Claims without a usable owner are rejected before touching the cache.
    /// Outside STEADY the transition is always `None`.
    pub fn apply(&mut self, event: &ClaimEvent, now: Timestamp) -> ClaimResult<Transition> {
        let owner = event.resulting_owner()?;
        match self.phase {
            SyncPhase::Inactive => Ok(Transition::None),
            SyncPhase::Syncing => {
                self.cache.set(&event.dimension, event.pos, owner);
                self.window.record_event(now);
                Ok(Transition::None)
            }
            SyncPhase::Steady => {
                let before = self.cache.set(&event.dimension, event.pos, owner);
                Ok(Transition::between(before, owner))
            }
        }
    }

    /// Feed a player motion sample to AFK detection
    pub fn observe_motion(&mut self, sample: MotionSample, now: Timestamp) -> Option<AfkChange> {
        if self.phase == SyncPhase::Inactive {
            return None;
        }
        self.activity.observe(sample, now)
    }

    /// Re-check AFK state and the sync window
    pub fn poll(&mut self, now: Timestamp) -> SyncProgress {
        if self.phase == SyncPhase::Inactive {
            return SyncProgress::Idle;
        }
        if let Some(change) = self.activity.poll(now) {
            info!(?change, phase = %self.phase, "player activity changed");
        }
        if self.phase != SyncPhase::Syncing {
            return SyncProgress::Idle;
        }
        if self.activity.is_afk() {
            return SyncProgress::Paused;
        }

        let baseline_counts = self.baseline.dimension_counts();
        let cache = &self.cache;
        let thresholds = self.reconciler.thresholds();
        let state = self.window.evaluate(now, || {
            !thresholds
                .suspect_dimensions(&baseline_counts, |dim| cache.dimension_count(dim))
                .is_empty()
        });

        match state {
            WindowState::Open => SyncProgress::Waiting {
                remaining_secs: self.window.remaining_secs(now),
            },
            WindowState::Extended => {
                info!(
                    window_secs = self.window.current().as_secs(),
                    "previously populated dimension still empty; extending sync window"
                );
                SyncProgress::Extended
            }
            WindowState::Elapsed => SyncProgress::Ready,
        }
    }

    /// Turn STEADY and reconcile the baseline against the synced cache.
    ///
    /// Returns `None` unless the session is syncing, so reconciliation runs at
    /// most once per session.
    pub fn complete(&mut self, now: Timestamp, names: &dyn OwnerNameResolver) -> Option<ReconciliationResult> {
        if self.phase != SyncPhase::Syncing {
            return None;
        }
        self.phase = SyncPhase::Steady;
        let live = self.cache.snapshot();
        let baseline = std::mem::take(&mut self.baseline);
        info!(
            events = self.window.events(),
            claims = live.total(),
            previous = baseline.total(),
            "initial sync complete"
        );
        Some(self.reconciler.reconcile(&baseline, &live, now, names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use claimwatch_core::{ChunkPos, Dimension, PlaceholderNames};
    use claimwatch_time::shift;
    use std::time::Duration;
    use uuid::Uuid;

    fn t0() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn at(secs: u64) -> Timestamp {
        shift(t0(), Duration::from_secs(secs))
    }

    fn owner(n: u128) -> OwnerId {
        OwnerId::new(Uuid::from_u128(n))
    }

    fn coordinator() -> SyncCoordinator {
        SyncCoordinator::new(
            Arc::new(ChunkOwnershipCache::new()),
            SyncWindowConfig::default(),
            ActivityConfig::default(),
            SafetyThresholds::default(),
            t0(),
        )
    }

    fn claim(x: i32, holder: u128) -> ClaimEvent {
        ClaimEvent::claimed(Dimension::overworld(), ChunkPos::new(x, 0), owner(holder))
    }

    fn unclaim(x: i32) -> ClaimEvent {
        ClaimEvent::unclaimed(Dimension::overworld(), ChunkPos::new(x, 0))
    }

    fn steady() -> SyncCoordinator {
        let mut c = coordinator();
        c.begin(OwnershipSnapshot::new(), t0());
        assert_eq!(c.poll(at(11)), SyncProgress::Ready);
        assert!(c.complete(at(11), &PlaceholderNames).is_some());
        c
    }

    #[test]
    fn test_syncing_events_produce_no_transitions() {
        let mut c = coordinator();
        c.begin(OwnershipSnapshot::new(), t0());
        assert_eq!(c.apply(&claim(0, 1), at(1)).unwrap(), Transition::None);
        assert_eq!(c.apply(&claim(0, 2), at(2)).unwrap(), Transition::None);
        assert_eq!(c.events_during_sync(), 2);
        assert!(matches!(c.poll(at(5)), SyncProgress::Waiting { remaining_secs: 7 }));
        assert_eq!(c.poll(at(13)), SyncProgress::Ready);
    }

    #[test]
    fn test_steady_transitions() {
        let mut c = steady();
        assert_eq!(c.apply(&claim(0, 1), at(12)).unwrap(), Transition::Added(owner(1)));
        assert_eq!(c.apply(&claim(0, 1), at(12)).unwrap(), Transition::None);
        assert_eq!(
            c.apply(&claim(0, 2), at(13)).unwrap(),
            Transition::Transferred { from: owner(1), to: owner(2) }
        );
        assert_eq!(c.apply(&unclaim(0), at(14)).unwrap(), Transition::Removed(owner(2)));
        assert_eq!(c.apply(&unclaim(0), at(15)).unwrap(), Transition::None);
    }

    #[test]
    fn test_transfer_records_remove_then_add() {
        let event = claim(3, 2);
        let records = Transition::Transferred { from: owner(1), to: owner(2) }.records(&event, at(0), &PlaceholderNames);
        let kinds: Vec<_> = records.iter().map(|r| (r.change, r.owner)).collect();
        assert_eq!(
            kinds,
            vec![(ChangeType::Remove, Some(owner(1))), (ChangeType::Add, Some(owner(2)))]
        );
        assert!(records.iter().all(|r| r.pos == ChunkPos::new(3, 0)));
    }

    #[test]
    fn test_invalid_claim_rejected() {
        let mut c = coordinator();
        c.begin(OwnershipSnapshot::new(), t0());
        let bad = ClaimEvent {
            dimension: Dimension::overworld(),
            pos: ChunkPos::new(0, 0),
            claimed: true,
            owner: Some(OwnerId::NIL),
        };
        assert!(c.apply(&bad, at(1)).is_err());
        assert_eq!(c.events_during_sync(), 0);
    }

    #[test]
    fn test_window_extends_for_empty_dimension() {
        let baseline: OwnershipSnapshot = (0..60)
            .map(|i| (Dimension::nether(), ChunkPos::new(i, 0), owner(1)))
            .collect();
        let mut c = coordinator();
        c.begin(baseline, t0());
        c.apply(&claim(0, 1), t0()).unwrap();

        assert_eq!(c.poll(at(11)), SyncProgress::Extended);
        assert!(matches!(c.poll(at(15)), SyncProgress::Waiting { .. }));
        assert_eq!(c.poll(at(21)), SyncProgress::Ready);
    }

    #[test]
    fn test_afk_pauses_completion() {
        let mut c = coordinator();
        c.begin(OwnershipSnapshot::new(), t0());
        let still = MotionSample::new(0.0, 64.0, 0.0, 0.0, 0.0);
        c.observe_motion(still, t0());
        assert_eq!(c.poll(at(15 * 60 + 1)), SyncProgress::Paused);
        assert!(c.is_afk());
        assert_eq!(c.poll(at(3600)), SyncProgress::Paused);
        assert_eq!(c.phase(), SyncPhase::Syncing);
    }

    #[test]
    fn test_afk_resume_then_complete() {
        let mut c = coordinator();
        c.begin(OwnershipSnapshot::new(), t0());
        c.observe_motion(MotionSample::new(0.0, 64.0, 0.0, 0.0, 0.0), t0());
        assert_eq!(c.poll(at(901)), SyncProgress::Paused);

        let moved = MotionSample::new(3.0, 64.0, 0.0, 0.0, 0.0);
        assert_eq!(c.observe_motion(moved, at(902)), Some(AfkChange::Resumed));
        assert_eq!(c.poll(at(903)), SyncProgress::Ready);
        assert_eq!(c.phase(), SyncPhase::Syncing);
    }

    #[test]
    fn test_reconciles_once() {
        let mut c = coordinator();
        let baseline: OwnershipSnapshot = [(Dimension::overworld(), ChunkPos::new(9, 9), owner(1))]
            .into_iter()
            .collect();
        c.begin(baseline, t0());
        let result = c.complete(at(11), &PlaceholderNames).unwrap();
        assert_eq!(result.removed, 1);
        assert_eq!(c.phase(), SyncPhase::Steady);
        assert!(c.complete(at(12), &PlaceholderNames).is_none());
        assert_eq!(c.poll(at(30)), SyncProgress::Idle);
    }
}
