//! Claimwatch Time - Clocks and timing policies
//!
//! This crate implements:
//! - Wall clock abstraction (system and manually driven)
//! - Sync window: idle-time detection with one-shot extension
//! - Activity monitor: AFK detection from sampled player motion

pub mod clock;
pub mod window;
pub mod activity;

pub use clock::*;
pub use window::*;
pub use activity::*;
