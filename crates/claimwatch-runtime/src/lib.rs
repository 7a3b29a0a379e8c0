//! Claimwatch Runtime - Session orchestration
//!
//! This crate ties the building blocks into one explicitly constructed
//! service with a join/leave lifecycle:
//! 1. Join: load the previous snapshot and change log, start syncing
//! 2. Sync: fill the cache until the idle window elapses (paused while AFK)
//! 3. Reconcile: diff the baseline against the synced cache, behind safety gates
//! 4. Steady: turn every ownership event into change records, flushed at once
//! 5. Leave: persist the snapshot (steady sessions only), flush, clear state

pub mod config;
pub mod coordinator;
pub mod tracker;
pub mod directory;
pub mod telemetry;

pub use config::*;
pub use coordinator::*;
pub use tracker::*;
pub use directory::*;
pub use telemetry::*;
