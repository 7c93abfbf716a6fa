//! Headless invasion runner for balance sampling and CI verification.
//!
//! Runs dungeon scenarios without a game client:
//!
//! - **Balance testing**: many seeds in parallel, aggregated into a summary
//! - **CI verification**: the same seed must always produce the same snapshot
//! - **Content checks**: catalog files are parsed and validated
//!
//! # Output
//!
//! - **stdout**: results as JSON (one object, or one event per line)
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Simulate the bundled crypt for 90 days
//! cargo run -p incursion_headless -- run --scenario crypt --days 90
//!
//! # Balance sample over 500 seeds
//! cargo run -p incursion_headless -- batch --scenario crypt --count 500 --output results/
//!
//! # Verify determinism
//! cargo run -p incursion_headless -- verify --scenario crypt --seed 12345
//! ```

pub mod batch;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, VerifyReport};
pub use metrics::{BatchSummary, MetricsCollector, RunMetrics};
pub use runner::{invade_once, run_scenario, run_scenario_with, state_hash};
pub use scenario::{load_catalog, Scenario, ScenarioError, StockEntry, BUNDLED_SCENARIOS};
