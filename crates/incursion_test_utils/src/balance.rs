//! Balance sampling across seeds.
//!
//! Runs the same invasion under many seeds and aggregates the results, so
//! tests can check that a dungeon is neither trivially safe nor hopeless.

use std::collections::BTreeMap;

use incursion_core::battle::Battle;
use incursion_core::facility::FacilityLayout;
use incursion_core::objectives::InvasionOutcome;
use incursion_core::outcome::{DetailedInvasionResult, EndReason, InvasionState};
use incursion_core::tuning::InvasionTuning;

/// Aggregate of many invasion results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvasionStats {
    /// Invasions sampled.
    pub total: u32,
    /// Invasions the defenders won.
    pub defender_wins: u32,
    /// Invasions the invaders won.
    pub invader_wins: u32,
    /// Count per end reason.
    pub by_reason: BTreeMap<&'static str, u32>,
    /// Sum of rounds over all invasions.
    pub total_turns: u32,
    /// Sum of invaders killed.
    pub total_kills: u32,
    /// Sum of defenders lost.
    pub total_defenders_lost: u32,
}

impl InvasionStats {
    /// Aggregate a set of results.
    #[must_use]
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a DetailedInvasionResult>) -> Self {
        let mut stats = Self::default();
        for result in results {
            stats.total += 1;
            match result.outcome {
                InvasionOutcome::Victory => stats.defender_wins += 1,
                InvasionOutcome::Defeat => stats.invader_wins += 1,
            }
            *stats.by_reason.entry(result.end_reason.as_str()).or_default() += 1;
            stats.total_turns += result.turns;
            stats.total_kills += result.invaders_killed;
            stats.total_defenders_lost += result.defenders_lost;
        }
        stats
    }

    /// Defender win rate (0.0 to 1.0). 0.5 when nothing was sampled.
    pub fn defender_win_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.5;
        }
        f64::from(self.defender_wins) / f64::from(self.total)
    }

    /// Mean rounds per invasion.
    pub fn avg_turns(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.total_turns) / f64::from(self.total)
    }

    /// Invasions that ended for `reason`.
    #[must_use]
    pub fn count(&self, reason: EndReason) -> u32 {
        self.by_reason.get(reason.as_str()).copied().unwrap_or(0)
    }

    /// Check if the defender win rate lies within `[min_rate, max_rate]`.
    pub fn is_balanced(&self, min_rate: f64, max_rate: f64) -> bool {
        let rate = self.defender_win_rate();
        rate >= min_rate && rate <= max_rate
    }
}

/// Play `invasion` to the end once per seed.
pub fn sample_battles<'a>(
    invasion: &InvasionState,
    layout: &FacilityLayout,
    tuning: &InvasionTuning,
    seeds: impl IntoIterator<Item = &'a str>,
) -> Vec<DetailedInvasionResult> {
    seeds
        .into_iter()
        .map(|seed| Battle::start(invasion.clone(), layout, tuning, seed).run_to_completion())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{party, sample_invasion, sample_layout};
    use incursion_core::catalog::InvaderClass;

    #[test]
    fn test_empty_stats() {
        let stats = InvasionStats::from_results(&Vec::<DetailedInvasionResult>::new());
        assert_eq!(stats.total, 0);
        assert!((stats.defender_win_rate() - 0.5).abs() < f64::EPSILON);
        assert!(stats.avg_turns().abs() < f64::EPSILON);
    }

    #[test]
    fn test_sampled_battles_all_end() {
        let invasion = sample_invasion(
            party(&[InvaderClass::Warrior, InvaderClass::Rogue, InvaderClass::Cleric]),
            "balance",
        );
        let seeds = ["a", "b", "c", "d", "e"];
        let results = sample_battles(&invasion, &sample_layout(), &InvasionTuning::default(), seeds);
        let stats = InvasionStats::from_results(&results);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.defender_wins + stats.invader_wins, 5);
        assert_eq!(stats.by_reason.values().sum::<u32>(), 5);
        assert!(results.iter().all(|r| r.turns <= 30));
        assert!(stats.is_balanced(0.0, 1.0));
    }
}
