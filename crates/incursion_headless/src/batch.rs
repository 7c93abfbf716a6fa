//! Batch runner for balance testing.
//!
//! Runs one scenario under many seeds in parallel using rayon. Each seed
//! gets its own independent service, so results do not depend on thread
//! scheduling.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use incursion_core::catalog::Catalog;

use crate::metrics::{BatchSummary, RunMetrics};
use crate::runner::run_scenario;
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario name or path.
    pub scenario: String,
    /// Number of seeds to run.
    pub run_count: u32,
    /// Maximum parallel runs (0 = use rayon default).
    pub parallel_runs: u32,
    /// Output directory for results.
    pub output_dir: PathBuf,
    /// First seed; run `i` uses `seed_start + i`.
    pub seed_start: u64,
    /// Days per run (`None` = the scenario's own length).
    pub days: Option<u32>,
    /// Catalog file (`None` = the standard catalog).
    pub catalog_path: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "crypt".to_string(),
            run_count: 100,
            parallel_runs: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            days: None,
            catalog_path: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario.
    pub fn new(scenario: &str, run_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            run_count,
            ..Default::default()
        }
    }

    /// Set output directory.
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Override the number of simulated days.
    pub fn with_days(mut self, days: u32) -> Self {
        self.days = Some(days);
        self
    }

    /// Load content from a catalog file.
    pub fn with_catalog(mut self, path: PathBuf) -> Self {
        self.catalog_path = Some(path);
        self
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual run metrics, in seed order.
    pub runs: Vec<RunMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Errors encountered.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Run index.
    pub run_index: u32,
    /// Seed used.
    pub seed: String,
    /// Error message.
    pub message: String,
}

/// Progress tracking for batch runs.
#[derive(Debug)]
pub struct BatchProgress {
    /// Total runs.
    pub total: u32,
    /// Completed runs.
    pub completed: Arc<AtomicU32>,
    /// Invasions repelled so far.
    pub defender_wins: Arc<AtomicU32>,
    /// Invasions finished so far.
    pub invasions: Arc<AtomicU32>,
    /// Start time.
    pub start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: Arc::new(AtomicU32::new(0)),
            defender_wins: Arc::new(AtomicU32::new(0)),
            invasions: Arc::new(AtomicU32::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a completed run.
    pub fn record_completion(&self, metrics: &RunMetrics) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.defender_wins
            .fetch_add(metrics.defender_wins(), Ordering::Relaxed);
        self.invasions
            .fetch_add(metrics.invasions.len() as u32, Ordering::Relaxed);
    }

    /// Get current completion count.
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage.
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Get estimated time remaining.
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }

        let elapsed = self.start_time.elapsed();
        let per_run = elapsed.as_secs_f64() / f64::from(completed);
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_run * f64::from(remaining))
    }

    /// Defender win rate over the invasions finished so far.
    pub fn current_defender_win_rate(&self) -> Option<f64> {
        let invasions = self.invasions.load(Ordering::Relaxed);
        if invasions == 0 {
            return None;
        }
        Some(f64::from(self.defender_wins.load(Ordering::Relaxed)) / f64::from(invasions))
    }

    /// Log progress.
    pub fn display(&self) {
        let eta = self.eta();
        info!(
            completed = self.current(),
            total = self.total,
            percent = self.percentage(),
            eta_secs = eta.as_secs(),
            defender_win_rate = ?self.current_defender_win_rate(),
            "Batch progress"
        );
    }
}

/// Seed string for run `index` of a batch starting at `seed_start`.
pub fn seed_for(seed_start: u64, index: u32) -> String {
    seed_start.wrapping_add(u64::from(index)).to_string()
}

/// Run a batch of seeds.
///
/// Fails only if the scenario or catalog cannot be loaded; per-seed failures
/// are collected in [`BatchResults::errors`].
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, ScenarioError> {
    let start = Instant::now();
    let mut scenario = Scenario::resolve(&config.scenario)?;
    if let Some(days) = config.days {
        scenario.days = days;
    }
    let catalog = crate::scenario::load_catalog(config.catalog_path.as_deref())?;
    let progress = BatchProgress::new(config.run_count);

    info!(
        "Starting batch run: {} seeds of '{}' ({} days each)",
        config.run_count, scenario.name, scenario.days
    );

    if config.parallel_runs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_runs as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<RunMetrics, BatchError>> = (0..config.run_count)
        .into_par_iter()
        .map(|i| {
            let seed = seed_for(config.seed_start, i);
            match run_scenario(&scenario, &catalog, &seed) {
                Ok(metrics) => {
                    progress.record_completion(&metrics);
                    let completed = progress.current();
                    if completed % 10 == 0 {
                        debug!("Progress: {}/{}", completed, config.run_count);
                    }
                    if completed % 100 == 0 {
                        progress.display();
                    }
                    Ok(metrics)
                }
                Err(e) => {
                    warn!("Run {} failed: {}", i, e);
                    Err(BatchError {
                        run_index: i,
                        seed,
                        message: e.to_string(),
                    })
                }
            }
        })
        .collect();

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunMetrics> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_runs(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} runs in {:.1}s ({} invasions, defender win rate {:.2})",
        runs.len(),
        duration_seconds,
        summary.total_invasions,
        summary.defender_win_rate
    );

    Ok(BatchResults {
        config,
        runs,
        summary,
        duration_seconds,
        errors,
    })
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Seed checked.
    pub seed: String,
    /// Final state hash of each run.
    pub hashes: Vec<u64>,
    /// Every run matched the first.
    pub deterministic: bool,
}

/// Run the same seed `runs` times and compare final snapshots.
pub fn verify_determinism(
    scenario: &Scenario,
    catalog: &Catalog,
    seed: &str,
    runs: u32,
) -> Result<VerifyReport, ScenarioError> {
    let results = (0..runs.max(1))
        .map(|_| run_scenario(scenario, catalog, seed))
        .collect::<Result<Vec<_>, _>>()?;

    let first = &results[0];
    let deterministic = results.iter().all(|r| r == first);
    Ok(VerifyReport {
        seed: seed.to_string(),
        hashes: results.iter().map(|r| r.final_state_hash).collect(),
        deterministic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.run_count, 100);
        assert_eq!(config.scenario, "crypt");
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("open_vault", 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_days(20);

        assert_eq!(config.scenario, "open_vault");
        assert_eq!(config.run_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.days, Some(20));
    }

    #[test]
    fn test_progress_tracking() {
        let progress = BatchProgress::new(100);
        assert_eq!(progress.current(), 0);
        assert!(progress.current_defender_win_rate().is_none());

        let mut metrics = RunMetrics::default();
        progress.record_completion(&metrics);
        metrics.days = 1;
        progress.record_completion(&metrics);

        assert_eq!(progress.current(), 2);
        assert!((progress.percentage() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_seed_for() {
        assert_eq!(seed_for(7, 0), "7");
        assert_eq!(seed_for(7, 3), "10");
        assert_eq!(seed_for(u64::MAX, 1), "0");
    }

    #[test]
    fn test_run_batch_small() {
        let results = run_batch(BatchConfig::new("crypt", 4).with_days(30)).unwrap();

        assert_eq!(results.runs.len(), 4);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_runs, 4);
        let seeds: Vec<_> = results.runs.iter().map(|r| r.seed.as_str()).collect();
        assert_eq!(seeds, ["0", "1", "2", "3"]);
    }

    #[test]
    fn test_unknown_scenario_fails_fast() {
        assert!(matches!(
            run_batch(BatchConfig::new("atlantis", 2)),
            Err(ScenarioError::Unknown(_))
        ));
    }

    #[test]
    fn test_verify_determinism() {
        let scenario = Scenario::bundled("crypt").unwrap();
        let report = verify_determinism(&scenario, &Catalog::standard(), "12345", 3).unwrap();
        assert!(report.deterministic);
        assert_eq!(report.hashes.len(), 3);
    }

    #[test]
    fn test_batch_results_save_load() {
        let results = run_batch(BatchConfig::new("crypt", 2).with_days(20)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.runs.len(), 2);
        assert_eq!(loaded.config.scenario, "crypt");
        assert_eq!(loaded.summary.total_invasions, results.summary.total_invasions);
    }
}
