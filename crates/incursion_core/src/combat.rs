//! Single-attack resolution.
//!
//! A d20 roll plus the attacker's attack must meet the defender's
//! `defense + 10`. A natural 20 always hits and a natural 1 always misses.
//! Hits deal `attack - defense`, never less than 1.

use serde::{Deserialize, Serialize};

use crate::rng::RollSource;

/// Hit threshold offset added to the defender's defense.
pub const HIT_THRESHOLD_BASE: i32 = 10;

/// Minimum damage of a successful hit.
pub const MIN_DAMAGE: i32 = 1;

/// The numbers the resolver needs from either side of an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CombatStats {
    /// Attack bonus.
    pub attack: i32,
    /// Defense.
    pub defense: i32,
    /// Current hit points.
    pub hp: i32,
}

impl CombatStats {
    /// Create a stat triple.
    #[must_use]
    pub const fn new(attack: i32, defense: i32, hp: i32) -> Self {
        Self {
            attack,
            defense,
            hp,
        }
    }
}

/// Result of one attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResolution {
    /// The d20 face rolled.
    pub roll: i32,
    /// Whether the attack connected.
    pub hit: bool,
    /// Damage dealt (zero on a miss).
    pub damage: i32,
    /// Defender hit points after the attack, never negative.
    pub defender_hp: i32,
    /// Whether the defender is dead.
    pub defender_dead: bool,
}

/// Whether a given roll hits.
#[must_use]
pub const fn is_hit(roll: i32, attack: i32, defense: i32) -> bool {
    roll == 20 || (roll != 1 && roll + attack >= defense + HIT_THRESHOLD_BASE)
}

/// Resolve an attack for a known roll. No randomness, no side effects.
#[must_use]
pub fn resolve_with_roll(roll: i32, attacker: CombatStats, defender: CombatStats) -> AttackResolution {
    let hit = is_hit(roll, attacker.attack, defender.defense);
    let damage = if hit {
        (attacker.attack - defender.defense).max(MIN_DAMAGE)
    } else {
        0
    };
    let defender_hp = (defender.hp - damage).max(0);
    AttackResolution {
        roll,
        hit,
        damage,
        defender_hp,
        defender_dead: defender_hp <= 0,
    }
}

/// Resolve an attack, drawing one d20 from `rng`.
pub fn resolve_attack(
    attacker: CombatStats,
    defender: CombatStats,
    rng: &mut impl RollSource,
) -> AttackResolution {
    let roll = rng.roll_d20();
    resolve_with_roll(roll, attacker, defender)
}
