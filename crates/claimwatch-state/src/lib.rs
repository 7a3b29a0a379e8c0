//! Claimwatch State - Ownership state and reconciliation
//!
//! This crate implements:
//! - Ownership snapshots (immutable per-dimension chunk -> owner tables)
//! - The live, concurrently readable chunk ownership cache
//! - Offline diff reconciliation guarded against false mass deletion

pub mod snapshot;
pub mod cache;
pub mod reconcile;

pub use snapshot::*;
pub use cache::*;
pub use reconcile::*;
