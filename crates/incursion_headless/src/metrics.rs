//! Run metrics collection for balance analysis.
//!
//! [`MetricsCollector`] listens to one service's event stream and folds it
//! into a [`RunMetrics`]; [`BatchSummary`] aggregates many runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use incursion_core::events::InvasionEvent;
use incursion_core::objectives::InvasionOutcome;
use incursion_core::outcome::DetailedInvasionResult;

/// Complete metrics for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: String,
    /// Days simulated.
    pub days: u32,
    /// Every finished invasion, in order.
    pub invasions: Vec<DetailedInvasionResult>,
    /// Invasions that were due but found no party.
    pub skipped: u32,
    /// Warnings issued.
    pub warnings: u32,
    /// Prisoners taken.
    pub prisoners_captured: u32,
    /// Prisoners handled by the scenario's policy.
    pub prisoners_handled: u32,
    /// Reputation at the end.
    pub final_reputation: i32,
    /// Experience at the end.
    pub final_experience: i32,
    /// Hash of the final facility snapshot.
    pub final_state_hash: u64,
}

impl RunMetrics {
    /// Invasions the facility repelled.
    #[must_use]
    pub fn defender_wins(&self) -> u32 {
        self.invasions
            .iter()
            .filter(|r| r.outcome == InvasionOutcome::Victory)
            .count() as u32
    }
}

/// Folds an event stream into [`RunMetrics`].
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: RunMetrics,
}

impl MetricsCollector {
    /// Create a collector for one run.
    pub fn new(scenario: &str, seed: &str, days: u32) -> Self {
        Self {
            metrics: RunMetrics {
                scenario: scenario.to_string(),
                seed: seed.to_string(),
                days,
                ..Default::default()
            },
        }
    }

    /// Record one event.
    pub fn observe(&mut self, event: &InvasionEvent) {
        let m = &mut self.metrics;
        match event {
            InvasionEvent::Warned { .. } => m.warnings += 1,
            InvasionEvent::Skipped { .. } => m.skipped += 1,
            InvasionEvent::Ended { result, .. } => m.invasions.push(result.clone()),
            InvasionEvent::PrisonerCaptured { .. } => m.prisoners_captured += 1,
            InvasionEvent::PrisonerHandled { .. } => m.prisoners_handled += 1,
            InvasionEvent::Triggered { .. } | InvasionEvent::RoundPlayed { .. } => {}
        }
    }

    /// Current metrics.
    pub fn current(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Finish with the facility's final standing.
    pub fn finalize(mut self, reputation: i32, experience: i32, state_hash: u64) -> RunMetrics {
        self.metrics.final_reputation = reputation;
        self.metrics.final_experience = experience;
        self.metrics.final_state_hash = state_hash;
        self.metrics
    }
}

/// Summary statistics across many runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Runs summarised.
    pub total_runs: u32,
    /// Invasions across all runs.
    pub total_invasions: u32,
    /// Invasions the facility repelled.
    pub defender_wins: u32,
    /// Invasions the party won.
    pub invader_wins: u32,
    /// Defender win rate (0.0 to 1.0).
    pub defender_win_rate: f64,
    /// Invasions per end reason.
    pub by_end_reason: BTreeMap<String, u32>,
    /// Mean rounds per invasion.
    pub avg_turns: f64,
    /// Mean invaders killed per invasion.
    pub avg_invaders_killed: f64,
    /// Mean defenders lost per invasion.
    pub avg_defenders_lost: f64,
    /// Mean final reputation per run.
    pub avg_final_reputation: f64,
    /// Prisoners taken across all runs.
    pub prisoners_captured: u32,
    /// Skipped invasions across all runs.
    pub skipped: u32,
}

impl BatchSummary {
    /// Calculate summary from a list of run metrics.
    #[must_use]
    pub fn from_runs(runs: &[RunMetrics]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            total_runs: runs.len() as u32,
            ..Default::default()
        };

        let mut turns = 0u64;
        let mut killed = 0u64;
        let mut lost = 0u64;
        let mut reputation = 0i64;

        for run in runs {
            reputation += i64::from(run.final_reputation);
            summary.prisoners_captured += run.prisoners_captured;
            summary.skipped += run.skipped;

            for result in &run.invasions {
                summary.total_invasions += 1;
                match result.outcome {
                    InvasionOutcome::Victory => summary.defender_wins += 1,
                    InvasionOutcome::Defeat => summary.invader_wins += 1,
                }
                *summary
                    .by_end_reason
                    .entry(result.end_reason.to_string())
                    .or_default() += 1;
                turns += u64::from(result.turns);
                killed += u64::from(result.invaders_killed);
                lost += u64::from(result.defenders_lost);
            }
        }

        summary.avg_final_reputation = reputation as f64 / runs.len() as f64;
        if summary.total_invasions > 0 {
            let n = f64::from(summary.total_invasions);
            summary.defender_win_rate = f64::from(summary.defender_wins) / n;
            summary.avg_turns = turns as f64 / n;
            summary.avg_invaders_killed = killed as f64 / n;
            summary.avg_defenders_lost = lost as f64 / n;
        }

        summary
    }

    /// Check if the defender win rate is within `threshold` of an even split.
    #[must_use]
    pub fn is_balanced(&self, threshold: f64) -> bool {
        (self.defender_win_rate - 0.5).abs() <= threshold
    }
}
