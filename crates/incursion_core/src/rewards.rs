//! Economic consequences of a finished invasion.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Span};
use crate::facility::{Resource, ResourceDelta, ResourceLedger};
use crate::math::{scale_amount, Fixed};
use crate::objectives::completed_secondaries;
use crate::outcome::InvasionState;
use crate::rng::RollSource;
use crate::tuning::InvasionTuning;

/// Stockpiles that shrink per secondary objective lost on defeat.
pub const DEFEAT_SCALED_RESOURCES: [Resource; 4] = [
    Resource::Crystals,
    Resource::Essence,
    Resource::Flux,
    Resource::Food,
];

/// Reputation, experience and resource changes from one invasion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvasionRewards {
    /// Reputation change (negative on defeat).
    pub reputation: i32,
    /// Experience gained.
    pub experience: i32,
    /// Ledger changes.
    pub resources: ResourceDelta,
}

fn roll_span(span: Span, rng: &mut impl RollSource) -> i64 {
    i64::from(rng.range_inclusive(span.min, span.max))
}

/// Rewards for repelling an invasion.
///
/// Loot is rolled for each killed invader in party order: gold, then
/// crystals, then essence. Gold and experience scale with the multiplier.
pub fn calculate_victory_rewards(
    state: &InvasionState,
    catalog: &Catalog,
    tuning: &InvasionTuning,
    reward_multiplier: Fixed,
    rng: &mut impl RollSource,
) -> InvasionRewards {
    let kills = state.invaders_killed as i32;
    let flawless = completed_secondaries(&state.objectives) == 0;
    let reputation = tuning.victory_reputation
        + tuning.reputation_per_kill * kills
        + if flawless { tuning.flawless_reputation_bonus } else { 0 };

    let base_experience =
        i64::from(tuning.experience_per_invader) * state.invaders.len() as i64;
    let experience = scale_amount(base_experience, reward_multiplier) as i32;

    let mut gold = 0;
    let mut resources = ResourceDelta::new();
    for invader in state.invaders.iter().filter(|i| !i.is_alive()) {
        let table = catalog.loot_for(invader.class);
        gold += roll_span(table.gold, rng);
        resources.add(Resource::Crystals, roll_span(table.crystals, rng));
        resources.add(Resource::Essence, roll_span(table.essence, rng));
    }
    resources.add(Resource::Gold, scale_amount(gold, reward_multiplier));

    tracing::debug!(
        invasion_id = %state.invasion_id,
        reputation,
        experience,
        gold,
        "Victory rewards"
    );
    InvasionRewards {
        reputation,
        experience,
        resources,
    }
}

/// Penalties for losing the altar.
///
/// A fixed share of gold, a fixed reputation hit, and a share of each
/// other stockpile per secondary objective the invaders completed.
pub fn calculate_defeat_penalties(
    state: &InvasionState,
    ledger: &impl ResourceLedger,
    tuning: &InvasionTuning,
) -> InvasionRewards {
    let mut resources = ResourceDelta::new();
    resources.add(
        Resource::Gold,
        -scale_amount(ledger.level(Resource::Gold), tuning.defeat_gold_loss),
    );

    let completed = completed_secondaries(&state.objectives) as u32;
    let share = tuning.loss_per_completed_secondary * Fixed::from_num(completed);
    for resource in DEFEAT_SCALED_RESOURCES {
        resources.add(resource, -scale_amount(ledger.level(resource), share));
    }

    tracing::debug!(
        invasion_id = %state.invasion_id,
        completed,
        "Defeat penalties"
    );
    InvasionRewards {
        reputation: -tuning.defeat_reputation_loss,
        experience: 0,
        resources,
    }
}
