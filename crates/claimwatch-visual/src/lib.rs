//! Claimwatch Visual State
//!
//! Ephemeral markers for chunks touched by a recent change batch.
//!
//! A highlight is never persisted and never accumulates: re-triggering a
//! chunk replaces its marker and restarts the fade. Opacity is a pure
//! function of age, so expired markers can be dropped lazily by readers.

pub mod highlight;

pub use highlight::*;
