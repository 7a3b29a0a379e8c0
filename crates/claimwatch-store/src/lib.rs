//! Claimwatch Store - Durable history and baseline persistence
//!
//! This crate implements the two per-session text artifacts:
//! - Change log (header + append-only rows, pruned to the retention window)
//! - Ownership snapshot (header + rows, overwritten on every save)
//!
//! plus history queries over loaded records and the session file layout.

pub mod codec;
pub mod changelog;
pub mod history;
pub mod snapshot;
pub mod paths;

pub use codec::*;
pub use changelog::*;
pub use history::*;
pub use snapshot::*;
pub use paths::*;
