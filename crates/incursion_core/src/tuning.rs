//! Numeric tuning for invasions.
//!
//! None of these constants are part of the algorithms; they can be swapped
//! out wholesale from a RON file. Missing fields fall back to the defaults.

use serde::{Deserialize, Serialize};

use crate::error::{InvasionError, Result};
use crate::math::{from_percent, percent_serde, Fixed};

/// All tunable invasion constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvasionTuning {
    // === Scheduling ===
    /// Days before the first invasion may be scheduled.
    pub grace_period_days: u32,
    /// Minimum days between two invasions.
    pub min_days_between_invasions: u32,
    /// Maximum absolute variance applied to the interval.
    pub interval_variance: i32,
    /// Game minutes in one day.
    pub minutes_per_day: u32,
    /// Game minutes of warning before an invasion day begins.
    pub warning_lead_minutes: u32,

    // === Battle ===
    /// Turn limit; reaching it is a defender victory.
    pub max_turns: u32,
    /// Altar hit points.
    pub altar_max_hp: i32,
    /// Altar defense against invader attack rolls.
    pub altar_defense: i32,
    /// Damage dealt by a trap to the invader that springs it.
    pub trap_damage: i32,
    /// Objective progress gained per round an invader holds a target room.
    pub room_objective_progress: i32,
    /// Profile dimension above which a weight table is blended in.
    pub profile_threshold: i32,
    /// Path cost multiplier for rooms scarier than current morale.
    pub fear_cost_multiplier: u32,

    // === Morale ===
    /// Morale lost when an ally dies.
    pub ally_death_morale: i32,
    /// Morale lost when a cleric or paladin dies.
    pub holy_ally_death_morale: i32,
    /// Morale lost when a trap is sprung.
    pub trap_morale: i32,
    /// Morale lost when a fear-prone invader springs a trap.
    pub fear_prone_trap_morale: i32,
    /// Fear level from which entering a room costs morale.
    pub fear_room_threshold: i32,
    /// Morale lost entering a fearful room.
    pub fear_room_morale: i32,
    /// Morale gained capturing a room.
    pub room_capture_morale: i32,
    /// Morale gained capturing a high-value room.
    pub high_value_capture_morale: i32,

    // === Outcome ===
    /// Chance that each retreating invader is captured.
    #[serde(with = "percent_serde")]
    pub capture_chance: Fixed,
    /// Reputation for any victory.
    pub victory_reputation: i32,
    /// Reputation per invader killed.
    pub reputation_per_kill: i32,
    /// Reputation bonus when no secondary objective was completed.
    pub flawless_reputation_bonus: i32,
    /// Experience per invader, before the reward multiplier.
    pub experience_per_invader: i32,
    /// Share of gold lost on defeat.
    #[serde(with = "percent_serde")]
    pub defeat_gold_loss: Fixed,
    /// Reputation lost on defeat.
    pub defeat_reputation_loss: i32,
    /// Share of each stockpile lost per secondary objective invaders completed.
    #[serde(with = "percent_serde")]
    pub loss_per_completed_secondary: Fixed,

    // === Prisoners ===
    /// Corruption gained executing a prisoner.
    pub execute_corruption: i64,
    /// Essence gained sacrificing a prisoner.
    pub sacrifice_essence: i64,
    /// Corruption gained sacrificing a prisoner.
    pub sacrifice_corruption: i64,
    /// Research gained experimenting on a prisoner.
    pub experiment_research: i64,
    /// Essence spent on each conversion attempt.
    pub convert_essence_cost: i64,
}

impl Default for InvasionTuning {
    fn default() -> Self {
        Self {
            grace_period_days: 14,
            min_days_between_invasions: 3,
            interval_variance: 2,
            minutes_per_day: 24,
            warning_lead_minutes: 2,

            max_turns: 30,
            altar_max_hp: 100,
            altar_defense: 2,
            trap_damage: 5,
            room_objective_progress: 34,
            profile_threshold: 60,
            fear_cost_multiplier: 3,

            ally_death_morale: -10,
            holy_ally_death_morale: -15,
            trap_morale: -5,
            fear_prone_trap_morale: -10,
            fear_room_threshold: 3,
            fear_room_morale: -15,
            room_capture_morale: 10,
            high_value_capture_morale: 15,

            capture_chance: from_percent(30),
            victory_reputation: 5,
            reputation_per_kill: 1,
            flawless_reputation_bonus: 3,
            experience_per_invader: 10,
            defeat_gold_loss: from_percent(20),
            defeat_reputation_loss: 10,
            loss_per_completed_secondary: from_percent(5),

            execute_corruption: 5,
            sacrifice_essence: 20,
            sacrifice_corruption: 10,
            experiment_research: 15,
            convert_essence_cost: 10,
        }
    }
}

impl InvasionTuning {
    /// Parse tuning from RON. Omitted fields keep their defaults.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| InvasionError::CatalogParse(e.to_string()))
    }

    /// Days between invasions for the current day, before variance.
    ///
    /// Invasions come faster as the facility ages: 15 days early on, 10
    /// from day 60 and 7 from day 100.
    #[must_use]
    pub const fn base_interval(day: u32) -> u32 {
        match day {
            0..=59 => 15,
            60..=99 => 10,
            _ => 7,
        }
    }
}
