//! Session fuzzer - invariant checking across session lifecycles
//!
//! Runs join/sync/steady/leave cycles with offline changes in between and
//! checks after every step that:
//! - each steady transition yields exactly the expected records
//! - replaying an already-applied event yields nothing
//! - the tracker cache matches the world once synced
//! - the change log never shrinks within a session
//! - offline reconciliation reports exactly the gated diff
//! - a steady session persists the world as the next baseline, and an
//!   interrupted one leaves the previous baseline untouched

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use claimwatch_core::{ChangeType, ClaimResult, Dimension, OwnerId};
use claimwatch_state::{OwnershipSnapshot, SafetyThresholds};
use claimwatch_store::SnapshotFile;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{SessionSimulator, SimConfig, StepOutcome};

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    pub world: SimConfig,
    /// Join/leave cycles to run
    pub cycles: usize,
    /// Random events per steady session
    pub events_per_cycle: usize,
    /// World changes between sessions
    pub offline_changes: usize,
    /// Probability of leaving before the sync completes
    pub interrupt_prob: f64,
    /// Probability of replaying an already-applied event after each step
    pub replay_prob: f64,
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            world: SimConfig::default(),
            cycles: 6,
            events_per_cycle: 200,
            offline_changes: 40,
            interrupt_prob: 0.2,
            replay_prob: 0.2,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    pub fn light() -> Self {
        FuzzerConfig {
            world: SimConfig::light(),
            cycles: 3,
            events_per_cycle: 50,
            offline_changes: 10,
            interrupt_prob: 0.0,
            replay_prob: 0.3,
            seed: 7,
        }
    }

    pub fn heavy() -> Self {
        FuzzerConfig {
            world: SimConfig::heavy(),
            cycles: 12,
            events_per_cycle: 2000,
            offline_changes: 500,
            interrupt_prob: 0.25,
            replay_prob: 0.1,
            seed: 42,
        }
    }
}

/// A broken invariant
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// Steady event produced the wrong records
    Transition { cycle: usize, detail: String },
    /// Replayed event produced records
    DuplicateRecord { cycle: usize },
    /// Cache disagrees with the world
    CacheMismatch { cycle: usize, cached: usize, world: usize },
    /// Change log lost records within a session
    LogShrank { cycle: usize, before: usize, after: usize },
    /// Reconciliation counts differ from the gated diff
    Reconciliation { cycle: usize, expected: DiffCounts, actual: DiffCounts },
    /// Persisted snapshot is not the expected baseline
    Snapshot { cycle: usize, persisted: usize, expected: usize },
    /// Sync never completed
    SyncStalled { cycle: usize },
}

/// Added/removed/transferred totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffCounts {
    pub added: u32,
    pub removed: u32,
    pub transferred: u32,
}

impl DiffCounts {
    /// Diff between two tables, skipping what the safety gates withhold
    pub fn expected(
        previous: &OwnershipSnapshot,
        live: &OwnershipSnapshot,
        thresholds: &SafetyThresholds,
    ) -> Self {
        let mut counts = DiffCounts::default();
        if thresholds.is_global_loss(previous.total(), live.total()) {
            return counts;
        }
        let live_counts = live.dimension_counts();
        let suspect = thresholds.suspect_dimensions(&previous.dimension_counts(), |dim| {
            live_counts.get(dim).copied().unwrap_or(0)
        });

        let mut dimensions: Vec<Dimension> = previous.dimensions();
        dimensions.extend(live.dimensions());
        dimensions.sort();
        dimensions.dedup();
        for dim in dimensions.iter().filter(|d| !suspect.contains(*d)) {
            let before: HashMap<_, OwnerId> = previous.claims_in(dim).into_iter().collect();
            for (pos, owner) in live.claims_in(dim) {
                match before.get(&pos) {
                    None => counts.added += 1,
                    Some(prev) if *prev != owner => counts.transferred += 1,
                    Some(_) => {}
                }
            }
            counts.removed += before
                .keys()
                .filter(|pos| live.get(dim, **pos).is_none())
                .count() as u32;
        }
        counts
    }
}

/// Fuzzing result
#[derive(Debug, Default)]
pub struct FuzzResult {
    pub cycles: usize,
    pub interrupted: usize,
    pub steady_events: usize,
    pub records: usize,
    pub violations: Vec<Violation>,
}

impl FuzzResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

pub struct SessionFuzzer {
    config: FuzzerConfig,
    sim: SessionSimulator,
    rng: StdRng,
    /// Baseline the tracker should find on the next join
    persisted: OwnershipSnapshot,
}

impl SessionFuzzer {
    pub fn new(config: FuzzerConfig) -> io::Result<Self> {
        let sim = SessionSimulator::new(config.world.clone())?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(SessionFuzzer {
            config,
            sim,
            rng,
            persisted: OwnershipSnapshot::new(),
        })
    }

    pub fn simulator(&self) -> &SessionSimulator {
        &self.sim
    }

    pub fn run(&mut self) -> ClaimResult<FuzzResult> {
        let mut result = FuzzResult::default();
        for cycle in 0..self.config.cycles {
            self.run_cycle(cycle, &mut result)?;
            result.cycles += 1;

            self.sim.offline_changes(self.config.offline_changes);
            self.sim.advance(Duration::from_secs(3600));
        }
        Ok(result)
    }

    fn run_cycle(&mut self, cycle: usize, result: &mut FuzzResult) -> ClaimResult<()> {
        let files = self.sim.files();
        self.sim.join()?;

        if self.rng.gen_bool(self.config.interrupt_prob) {
            self.sim.leave();
            result.interrupted += 1;
            self.check_snapshot(cycle, &files.snapshot, result);
            return Ok(());
        }

        let expected = DiffCounts::expected(
            &self.persisted,
            &self.sim.world(),
            &self.sim.tracker().config().safety,
        );
        let Some(report) = self.sim.finish_sync() else {
            result.violations.push(Violation::SyncStalled { cycle });
            self.sim.leave();
            return Ok(());
        };
        let actual = DiffCounts {
            added: report.added,
            removed: report.removed,
            transferred: report.transferred,
        };
        if actual != expected {
            result
                .violations
                .push(Violation::Reconciliation { cycle, expected, actual });
        }
        self.check_cache(cycle, result);

        let tracker = Arc::clone(self.sim.tracker());
        let log_len = || tracker.change_log().map_or(0, |log| log.len());
        for _ in 0..self.config.events_per_cycle {
            let before_len = log_len();
            let step = self.sim.step()?;
            result.steady_events += 1;
            result.records += step.records.len();
            if let Err(detail) = check_transition(&step) {
                result.violations.push(Violation::Transition { cycle, detail });
            }

            if self.rng.gen_bool(self.config.replay_prob) {
                let coord = step.event.coord();
                let replayed = self.sim.tracker().on_chunk_update(self.sim.replay_event(&coord))?;
                if !replayed.is_empty() {
                    result.violations.push(Violation::DuplicateRecord { cycle });
                }
            }

            let after_len = log_len();
            if after_len < before_len + step.records.len() {
                result.violations.push(Violation::LogShrank {
                    cycle,
                    before: before_len,
                    after: after_len,
                });
            }
        }
        self.check_cache(cycle, result);

        self.sim.leave();
        self.persisted = self.sim.world();
        self.check_snapshot(cycle, &files.snapshot, result);
        Ok(())
    }

    fn check_cache(&self, cycle: usize, result: &mut FuzzResult) {
        let cached = self.sim.tracker().cache();
        let world = self.sim.world();
        if cached != world {
            result.violations.push(Violation::CacheMismatch {
                cycle,
                cached: cached.total(),
                world: world.total(),
            });
        }
    }

    fn check_snapshot(&self, cycle: usize, path: &std::path::Path, result: &mut FuzzResult) {
        let persisted = SnapshotFile::new(path).load().unwrap_or_default();
        if persisted != self.persisted {
            result.violations.push(Violation::Snapshot {
                cycle,
                persisted: persisted.total(),
                expected: self.persisted.total(),
            });
        }
    }
}

/// Records one steady event must produce, given the owner before and after
fn check_transition(step: &StepOutcome) -> Result<(), String> {
    let expected: Vec<(ChangeType, OwnerId)> = match (step.before, step.after) {
        (None, Some(to)) => vec![(ChangeType::Add, to)],
        (Some(from), None) => vec![(ChangeType::Remove, from)],
        (Some(from), Some(to)) if from != to => {
            vec![(ChangeType::Remove, from), (ChangeType::Add, to)]
        }
        _ => Vec::new(),
    };
    let actual: Vec<(ChangeType, OwnerId)> = step
        .records
        .iter()
        .filter_map(|r| r.owner.map(|owner| (r.change, owner)))
        .collect();

    if actual != expected || actual.len() != step.records.len() {
        return Err(format!(
            "{} at {}: expected {:?}, got {:?}",
            step.event.dimension, step.event.pos, expected, actual
        ));
    }
    if step.records.iter().any(|r| r.coord() != step.event.coord()) {
        return Err(format!("record position differs from event at {}", step.event.pos));
    }
    Ok(())
}
