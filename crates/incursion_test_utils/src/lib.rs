//! # Incursion Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Dungeon, ledger and party fixtures
//! - Balance sampling across seeds
//! - Scripted roll sources
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod balance;
pub mod determinism;
pub mod fixtures;

/// Scripted roll source.
pub use incursion_core::rng::ScriptedRolls;

/// Re-export proptest for convenience.
pub use proptest;
