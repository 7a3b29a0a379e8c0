//! Offline diff reconciliation
//!
//! Compares the ownership table persisted at the end of the previous session
//! with the table observed after the initial sync, emitting the changes that
//! happened while the user was away.
//!
//! Two guards protect against the most common failure: a sync that delivered
//! nothing (or nothing for one dimension) would otherwise be recorded as the
//! mass removal of every known claim.

use std::collections::{BTreeSet, HashMap};

use claimwatch_core::{
    display_name, ChangeRecord, ChangeType, ChunkPos, Dimension, OwnerId, OwnerNameResolver,
    Timestamp,
};
use tracing::{debug, info, warn};

use crate::OwnershipSnapshot;

/// Thresholds for the data-loss guards
#[derive(Clone, Debug)]
pub struct SafetyThresholds {
    /// Minimum previous total for an empty live table to count as data loss
    pub global_min_claims: usize,
    /// Minimum previous per-dimension count for an empty dimension to be suspect
    pub dimension_min_claims: usize,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        SafetyThresholds {
            global_min_claims: 10,
            dimension_min_claims: 50,
        }
    }
}

impl SafetyThresholds {
    /// True when a non-trivial previous table faces an entirely empty live one
    pub fn is_global_loss(&self, previous_total: usize, live_total: usize) -> bool {
        previous_total >= self.global_min_claims && live_total == 0
    }

    /// Previously well-populated dimensions that now report no claims at all.
    ///
    /// `live_count` gives the current claim count of a dimension.
    pub fn suspect_dimensions(
        &self,
        previous_counts: &HashMap<Dimension, usize>,
        live_count: impl Fn(&Dimension) -> usize,
    ) -> BTreeSet<Dimension> {
        previous_counts
            .iter()
            .filter(|(dim, count)| **count >= self.dimension_min_claims && live_count(dim) == 0)
            .map(|(dim, _)| dim.clone())
            .collect()
    }
}

/// Outcome of the data-loss checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataLossVerdict {
    /// Everything looks plausible
    Clear,
    /// Some dimensions look wiped; they are left out of the diff
    SuspectDimensions(BTreeSet<Dimension>),
    /// The live table is empty; no diff is produced at all
    GlobalLoss,
}

impl DataLossVerdict {
    pub fn is_global_loss(&self) -> bool {
        matches!(self, DataLossVerdict::GlobalLoss)
    }

    pub fn is_suspect(&self, dimension: &Dimension) -> bool {
        match self {
            DataLossVerdict::Clear => false,
            DataLossVerdict::SuspectDimensions(dims) => dims.contains(dimension),
            DataLossVerdict::GlobalLoss => true,
        }
    }
}

/// Reconciliation result
#[derive(Debug)]
pub struct ReconciliationResult {
    /// Emitted change records, all stamped with the reconciliation time
    pub records: Vec<ChangeRecord>,
    pub verdict: DataLossVerdict,
    pub added: u32,
    pub removed: u32,
    /// Chunks that changed hands (each produces a REMOVE and an ADD)
    pub transferred: u32,
}

impl ReconciliationResult {
    fn skipped(verdict: DataLossVerdict) -> Self {
        ReconciliationResult {
            records: Vec::new(),
            verdict,
            added: 0,
            removed: 0,
            transferred: 0,
        }
    }
}

/// Offline diff reconciler
#[derive(Clone, Debug, Default)]
pub struct OfflineDiffReconciler {
    thresholds: SafetyThresholds,
}

impl OfflineDiffReconciler {
    pub fn new(thresholds: SafetyThresholds) -> Self {
        OfflineDiffReconciler { thresholds }
    }

    pub fn thresholds(&self) -> &SafetyThresholds {
        &self.thresholds
    }

    /// Run the data-loss checks only
    pub fn assess(&self, previous: &OwnershipSnapshot, live: &OwnershipSnapshot) -> DataLossVerdict {
        if self.thresholds.is_global_loss(previous.total(), live.total()) {
            return DataLossVerdict::GlobalLoss;
        }
        let suspects = self
            .thresholds
            .suspect_dimensions(&previous.dimension_counts(), |dim| live.dimension_count(dim));
        if suspects.is_empty() {
            DataLossVerdict::Clear
        } else {
            DataLossVerdict::SuspectDimensions(suspects)
        }
    }

    /// Diff `previous` against `live`.
    ///
    /// Removals and transfers are emitted dimension by dimension in position
    /// order, followed by new claims, so output is deterministic.
    pub fn reconcile(
        &self,
        previous: &OwnershipSnapshot,
        live: &OwnershipSnapshot,
        now: Timestamp,
        names: &dyn OwnerNameResolver,
    ) -> ReconciliationResult {
        let verdict = self.assess(previous, live);
        match &verdict {
            DataLossVerdict::GlobalLoss => {
                warn!(
                    previous = previous.total(),
                    "live ownership table is empty; skipping offline reconciliation"
                );
                return ReconciliationResult::skipped(verdict);
            }
            DataLossVerdict::SuspectDimensions(dims) => {
                for dim in dims {
                    warn!(
                        dimension = %dim,
                        previous = previous.dimension_count(dim),
                        "dimension reports no claims; excluded from reconciliation"
                    );
                }
            }
            DataLossVerdict::Clear => {}
        }

        let mut result = ReconciliationResult::skipped(verdict);
        let mut resolved: HashMap<OwnerId, String> = HashMap::new();
        let mut name_of = |owner: OwnerId| {
            resolved
                .entry(owner)
                .or_insert_with(|| display_name(names, Some(owner)))
                .clone()
        };

        // Pass 1: everything the previous table knew about
        for dim in previous.dimensions() {
            if result.verdict.is_suspect(&dim) {
                continue;
            }
            for (pos, before) in previous.claims_in(&dim) {
                match live.get(&dim, pos) {
                    None => {
                        result.records.push(record(now, before, name_of(before), &dim, pos, ChangeType::Remove));
                        result.removed += 1;
                    }
                    Some(after) if after != before => {
                        result.records.push(record(now, before, name_of(before), &dim, pos, ChangeType::Remove));
                        result.records.push(record(now, after, name_of(after), &dim, pos, ChangeType::Add));
                        result.removed += 1;
                        result.added += 1;
                        result.transferred += 1;
                    }
                    Some(_) => {}
                }
            }
        }

        // Pass 2: claims that did not exist before
        for dim in live.dimensions() {
            if result.verdict.is_suspect(&dim) {
                continue;
            }
            for (pos, after) in live.claims_in(&dim) {
                if !previous.contains(&dim, pos) {
                    result.records.push(record(now, after, name_of(after), &dim, pos, ChangeType::Add));
                    result.added += 1;
                }
            }
        }

        if result.records.is_empty() {
            debug!("no ownership changes while offline");
        } else {
            info!(
                added = result.added,
                removed = result.removed,
                transferred = result.transferred,
                "offline changes reconciled"
            );
        }
        result
    }
}

fn record(
    now: Timestamp,
    owner: OwnerId,
    name: String,
    dimension: &Dimension,
    pos: ChunkPos,
    change: ChangeType,
) -> ChangeRecord {
    ChangeRecord::new(now, Some(owner), name, dimension.clone(), pos, change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use claimwatch_core::PlaceholderNames;
    use uuid::Uuid;

    fn now() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn owner(n: u128) -> OwnerId {
        OwnerId::new(Uuid::from_u128(n))
    }

    fn filled(dim: &Dimension, count: i32, holder: OwnerId) -> Vec<(Dimension, ChunkPos, OwnerId)> {
        (0..count)
            .map(|i| (dim.clone(), ChunkPos::new(i, 0), holder))
            .collect()
    }

    #[test]
    fn test_add_remove_transfer() {
        let ow = Dimension::overworld();
        let previous: OwnershipSnapshot = [
            (ow.clone(), ChunkPos::new(0, 0), owner(1)),
            (ow.clone(), ChunkPos::new(1, 0), owner(1)),
            (ow.clone(), ChunkPos::new(2, 0), owner(1)),
        ]
        .into_iter()
        .collect();
        let live: OwnershipSnapshot = [
            (ow.clone(), ChunkPos::new(0, 0), owner(1)),
            (ow.clone(), ChunkPos::new(2, 0), owner(2)),
            (ow.clone(), ChunkPos::new(9, 9), owner(2)),
        ]
        .into_iter()
        .collect();

        let result = OfflineDiffReconciler::default().reconcile(&previous, &live, now(), &PlaceholderNames);
        assert_eq!(result.verdict, DataLossVerdict::Clear);
        assert_eq!((result.added, result.removed, result.transferred), (2, 2, 1));

        let kinds: Vec<_> = result
            .records
            .iter()
            .map(|r| (r.pos, r.change, r.owner))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ChunkPos::new(1, 0), ChangeType::Remove, Some(owner(1))),
                (ChunkPos::new(2, 0), ChangeType::Remove, Some(owner(1))),
                (ChunkPos::new(2, 0), ChangeType::Add, Some(owner(2))),
                (ChunkPos::new(9, 9), ChangeType::Add, Some(owner(2))),
            ]
        );
        assert!(result.records.iter().all(|r| r.timestamp == now()));
    }

    #[test]
    fn test_unchanged_tables_emit_nothing() {
        let previous: OwnershipSnapshot = filled(&Dimension::overworld(), 20, owner(1)).into_iter().collect();
        let result = OfflineDiffReconciler::default().reconcile(&previous, &previous.clone(), now(), &PlaceholderNames);
        assert!(result.records.is_empty());
    }

    #[test]
    fn test_global_gate_blocks_everything() {
        let previous: OwnershipSnapshot = filled(&Dimension::overworld(), 10, owner(1)).into_iter().collect();
        let result = OfflineDiffReconciler::default().reconcile(
            &previous,
            &OwnershipSnapshot::new(),
            now(),
            &PlaceholderNames,
        );
        assert!(result.verdict.is_global_loss());
        assert!(result.records.is_empty());
    }

    #[test]
    fn test_small_previous_table_may_empty() {
        let previous: OwnershipSnapshot = filled(&Dimension::overworld(), 9, owner(1)).into_iter().collect();
        let result = OfflineDiffReconciler::default().reconcile(
            &previous,
            &OwnershipSnapshot::new(),
            now(),
            &PlaceholderNames,
        );
        assert_eq!(result.verdict, DataLossVerdict::Clear);
        assert_eq!(result.removed, 9);
    }

    #[test]
    fn test_wiped_dimension_excluded_sibling_reconciled() {
        let ow = Dimension::overworld();
        let nether = Dimension::nether();
        let mut previous: OwnershipSnapshot = filled(&nether, 60, owner(1)).into_iter().collect();
        previous.insert(ow.clone(), ChunkPos::new(0, 5), owner(2));
        previous.insert(ow.clone(), ChunkPos::new(1, 5), owner(2));

        let mut live = OwnershipSnapshot::new();
        live.insert(ow.clone(), ChunkPos::new(0, 5), owner(2));
        live.insert(ow.clone(), ChunkPos::new(7, 7), owner(3));

        let result = OfflineDiffReconciler::default().reconcile(&previous, &live, now(), &PlaceholderNames);
        assert!(result.verdict.is_suspect(&nether));
        assert!(!result.verdict.is_suspect(&ow));
        assert!(result.records.iter().all(|r| r.dimension == ow));
        assert_eq!((result.added, result.removed), (1, 1));
    }

    #[test]
    fn test_names_resolved_once_per_owner() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let lookups = AtomicUsize::new(0);
        let resolver = |_: OwnerId| {
            lookups.fetch_add(1, Ordering::SeqCst);
            Some("Builders".to_string())
        };
        let live: OwnershipSnapshot = filled(&Dimension::overworld(), 5, owner(4)).into_iter().collect();
        let result = OfflineDiffReconciler::default().reconcile(&OwnershipSnapshot::new(), &live, now(), &resolver);
        assert_eq!(result.added, 5);
        assert!(result.records.iter().all(|r| r.owner_name == "Builders"));
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }
}
