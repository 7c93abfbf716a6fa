//! Invasion-owned invader instances.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{BaseStats, InvaderClass, InvaderDefinition, COURAGE_ABILITY};
use crate::combat::CombatStats;
use crate::facility::RoomId;

/// Unique identifier for an invader within one invasion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvaderId(pub u32);

impl fmt::Display for InvaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invader#{}", self.0)
    }
}

/// Lingering effect kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Steadies the party against frightening rooms.
    Courage,
    /// Loses one hit point at the start of each round.
    Bleeding,
}

/// A status effect with its remaining duration in rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Kind.
    pub kind: StatusKind,
    /// Rounds left.
    pub remaining_rounds: u32,
}

/// Cooldown and duration bookkeeping for one ability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityState {
    /// Ability id from the catalog.
    pub ability_id: String,
    /// Rounds until usable again.
    pub cooldown: u32,
    /// Rounds the current activation lasts.
    pub remaining_duration: u32,
}

impl AbilityState {
    /// Fresh, ready ability.
    #[must_use]
    pub fn ready(ability_id: impl Into<String>) -> Self {
        Self {
            ability_id: ability_id.into(),
            cooldown: 0,
            remaining_duration: 0,
        }
    }

    /// Whether the ability can be used this round.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.cooldown == 0
    }

    /// Advance one round.
    pub fn tick(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
        self.remaining_duration = self.remaining_duration.saturating_sub(1);
    }
}

/// An invader taking part in one invasion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvaderInstance {
    /// Invasion-scoped identifier.
    pub id: InvaderId,
    /// Catalog definition id.
    pub definition_id: String,
    /// Display name.
    pub name: String,
    /// Archetype.
    pub class: InvaderClass,
    /// Current hit points.
    pub current_hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Attack bonus.
    pub attack: i32,
    /// Defense.
    pub defense: i32,
    /// Initiative.
    pub speed: i32,
    /// Active status effects.
    pub status_effects: Vec<StatusEffect>,
    /// Ability bookkeeping.
    pub abilities: Vec<AbilityState>,
    /// Room the invader last stood in.
    pub room: Option<RoomId>,
    /// Left the facility alive.
    pub fled: bool,
}

impl InvaderInstance {
    /// Instantiate a catalog definition.
    #[must_use]
    pub fn from_definition(id: InvaderId, definition: &InvaderDefinition) -> Self {
        let BaseStats {
            hp,
            attack,
            defense,
            speed,
        } = definition.stats;
        Self {
            id,
            definition_id: definition.id.clone(),
            name: definition.name.clone(),
            class: definition.class,
            current_hp: hp,
            max_hp: hp,
            attack,
            defense,
            speed,
            status_effects: Vec::new(),
            abilities: definition
                .abilities
                .iter()
                .map(AbilityState::ready)
                .collect(),
            room: None,
            fled: false,
        }
    }

    /// Still has hit points.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.current_hp > 0
    }

    /// Alive and still inside the facility.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_alive() && !self.fled
    }

    /// Dead or gone; no longer part of the fight.
    #[must_use]
    pub const fn is_out_of_fight(&self) -> bool {
        !self.is_active()
    }

    /// Carries courage, from an ability or an effect.
    #[must_use]
    pub fn has_courage(&self) -> bool {
        self.abilities.iter().any(|a| a.ability_id == COURAGE_ABILITY)
            || self
                .status_effects
                .iter()
                .any(|e| e.kind == StatusKind::Courage)
    }

    /// Current stats for the combat resolver.
    #[must_use]
    pub const fn combat_stats(&self) -> CombatStats {
        CombatStats::new(self.attack, self.defense, self.current_hp)
    }

    /// Current stats as a base stat block (used when taken prisoner).
    #[must_use]
    pub const fn stats(&self) -> BaseStats {
        BaseStats::new(self.current_hp, self.attack, self.defense, self.speed)
    }

    /// Add or refresh a status effect.
    pub fn add_status(&mut self, kind: StatusKind, rounds: u32) {
        if let Some(existing) = self.status_effects.iter_mut().find(|e| e.kind == kind) {
            existing.remaining_rounds = existing.remaining_rounds.max(rounds);
        } else {
            self.status_effects.push(StatusEffect {
                kind,
                remaining_rounds: rounds,
            });
        }
    }

    /// Advance effects and abilities one round.
    ///
    /// Returns damage taken from lingering effects. Never drops below zero.
    pub fn tick_round(&mut self) -> i32 {
        let mut damage = 0;
        for effect in &mut self.status_effects {
            if effect.kind == StatusKind::Bleeding && effect.remaining_rounds > 0 {
                damage += 1;
            }
            effect.remaining_rounds = effect.remaining_rounds.saturating_sub(1);
        }
        self.status_effects.retain(|e| e.remaining_rounds > 0);
        for ability in &mut self.abilities {
            ability.tick();
        }
        let before = self.current_hp;
        self.current_hp = (self.current_hp - damage).max(0);
        before - self.current_hp
    }
}
