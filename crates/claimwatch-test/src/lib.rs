//! Claimwatch Test Harness - Simulation and invariant fuzzing
//!
//! This crate provides:
//! - A seeded session simulator driving a real tracker on a manual clock
//! - A session fuzzer checking change-detection, reconciliation and
//!   persistence invariants across join/leave cycles
//! - Criterion benchmarks for both grouping variants

pub mod simulator;
pub mod session_fuzzer;

pub use simulator::*;
pub use session_fuzzer::*;
