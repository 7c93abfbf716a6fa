//! Content catalog: invader definitions and per-class tables.
//!
//! The catalog is static content owned outside the simulation. This module
//! only defines the data types and parses them from RON; file loading is the
//! caller's job.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{InvasionError, Result};
use crate::math::{from_percent, percent_serde, Fixed};

/// Invader archetype. Drives composition weights, loot and morale rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InvaderClass {
    /// Front-line fighter. Every party gets one when the catalog has any.
    Warrior,
    /// Light-fingered skirmisher.
    Rogue,
    /// Arcane caster drawn by knowledge.
    Mage,
    /// Healer drawn by corruption.
    Cleric,
    /// Holy knight drawn by corruption.
    Paladin,
    /// Scout and archer.
    Ranger,
    /// Relic hunter drawn by knowledge.
    Scholar,
}

impl InvaderClass {
    /// All classes in a stable order.
    pub const ALL: [Self; 7] = [
        Self::Warrior,
        Self::Rogue,
        Self::Mage,
        Self::Cleric,
        Self::Paladin,
        Self::Ranger,
        Self::Scholar,
    ];

    /// Clerics and paladins hold the party together; losing one hurts more.
    #[must_use]
    pub const fn is_holy(self) -> bool {
        matches!(self, Self::Cleric | Self::Paladin)
    }

    /// Classes that panic harder when a trap goes off.
    #[must_use]
    pub const fn is_fear_prone(self) -> bool {
        matches!(self, Self::Rogue | Self::Scholar)
    }

    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warrior => "warrior",
            Self::Rogue => "rogue",
            Self::Mage => "mage",
            Self::Cleric => "cleric",
            Self::Paladin => "paladin",
            Self::Ranger => "ranger",
            Self::Scholar => "scholar",
        }
    }
}

impl fmt::Display for InvaderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base combat statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BaseStats {
    /// Maximum hit points.
    pub hp: i32,
    /// Attack bonus added to the d20 roll and used for damage.
    pub attack: i32,
    /// Defense; the hit threshold is `defense + 10`.
    pub defense: i32,
    /// Initiative; higher acts earlier in a round.
    pub speed: i32,
}

impl BaseStats {
    /// Create a stat block.
    #[must_use]
    pub const fn new(hp: i32, attack: i32, defense: i32, speed: i32) -> Self {
        Self {
            hp,
            attack,
            defense,
            speed,
        }
    }
}

/// Ability id that fully negates fear-room morale loss for the party.
pub const COURAGE_ABILITY: &str = "courage";

/// Static invader definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvaderDefinition {
    /// Unique identifier.
    pub id: String,
    /// Archetype.
    pub class: InvaderClass,
    /// Display name.
    pub name: String,
    /// Base combat statistics.
    pub stats: BaseStats,
    /// Ability ids.
    #[serde(default)]
    pub abilities: Vec<String>,
}

impl InvaderDefinition {
    /// Create a definition without abilities.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        class: InvaderClass,
        name: impl Into<String>,
        stats: BaseStats,
    ) -> Self {
        Self {
            id: id.into(),
            class,
            name: name.into(),
            stats,
            abilities: Vec::new(),
        }
    }

    /// Builder method to add an ability.
    #[must_use]
    pub fn with_ability(mut self, ability: impl Into<String>) -> Self {
        self.abilities.push(ability.into());
        self
    }
}

/// Largest weight a single class may carry in a composition table.
pub const MAX_CLASS_WEIGHT: u32 = 1_000_000;

/// Class weights for one profile table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassWeights(pub BTreeMap<InvaderClass, u32>);

impl ClassWeights {
    /// Build from `(class, weight)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(InvaderClass, u32)]) -> Self {
        Self(pairs.iter().copied().collect())
    }

    /// Weight of a class (zero if absent).
    #[must_use]
    pub fn weight(&self, class: InvaderClass) -> u32 {
        self.0.get(&class).copied().unwrap_or(0)
    }

    /// Element-wise sum of several tables.
    #[must_use]
    pub fn blend<'a>(tables: impl IntoIterator<Item = &'a ClassWeights>) -> Self {
        let mut blended = BTreeMap::new();
        for table in tables {
            for (&class, &weight) in &table.0 {
                let entry = blended.entry(class).or_insert(0u32);
                *entry = entry.saturating_add(weight);
            }
        }
        Self(blended)
    }
}

/// Composition weight configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompositionWeights {
    /// Used when no profile dimension is high.
    pub balanced: ClassWeights,
    /// Blended in when corruption is high.
    pub high_corruption: ClassWeights,
    /// Blended in when wealth is high.
    pub high_wealth: ClassWeights,
    /// Blended in when knowledge is high.
    pub high_knowledge: ClassWeights,
}

/// Inclusive integer range rolled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Lower bound.
    pub min: i32,
    /// Upper bound.
    pub max: i32,
}

impl Span {
    /// Create a span.
    #[must_use]
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }
}

/// Loot dropped by a killed invader of one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LootTable {
    /// Gold range (scaled by the reward multiplier).
    pub gold: Span,
    /// Crystal range.
    #[serde(default)]
    pub crystals: Span,
    /// Essence range.
    #[serde(default)]
    pub essence: Span,
}

/// How a captured invader of one class can be exploited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptivityTable {
    /// Gold paid on ransom.
    pub ransom: Span,
    /// Chance that conversion succeeds (written as a whole percentage).
    #[serde(with = "percent_serde")]
    pub convert_chance: Fixed,
}

impl Default for CaptivityTable {
    fn default() -> Self {
        Self {
            ransom: Span::new(20, 40),
            convert_chance: from_percent(5),
        }
    }
}

/// The full content catalog consumed by the invasion core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Invader definitions.
    pub invaders: Vec<InvaderDefinition>,
    /// Composition weights; `None` means invasions cannot be composed.
    #[serde(default)]
    pub composition_weights: Option<CompositionWeights>,
    /// Loot tables by class.
    #[serde(default)]
    pub loot: BTreeMap<InvaderClass, LootTable>,
    /// Captivity tables by class.
    #[serde(default)]
    pub captivity: BTreeMap<InvaderClass, CaptivityTable>,
    /// Names handed to captured invaders.
    #[serde(default)]
    pub prisoner_names: Vec<String>,
}

impl Catalog {
    /// Parse a catalog from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| InvasionError::CatalogParse(e.to_string()))
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| InvasionError::CatalogParse(e.to_string()))
    }

    /// Look up an invader definition by id.
    #[must_use]
    pub fn invader(&self, id: &str) -> Option<&InvaderDefinition> {
        self.invaders.iter().find(|d| d.id == id)
    }

    /// Loot table for a class (empty table if absent).
    #[must_use]
    pub fn loot_for(&self, class: InvaderClass) -> LootTable {
        self.loot.get(&class).copied().unwrap_or_default()
    }

    /// Captivity table for a class (defaults if absent).
    #[must_use]
    pub fn captivity_for(&self, class: InvaderClass) -> CaptivityTable {
        self.captivity.get(&class).copied().unwrap_or_default()
    }

    /// Check the catalog for content problems.
    ///
    /// Returns a list of human-readable issues; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.invaders.is_empty() {
            issues.push("no invader definitions".to_string());
        }
        match &self.composition_weights {
            None => issues.push("missing composition_weights".to_string()),
            Some(weights) => {
                for (label, table) in [
                    ("balanced", &weights.balanced),
                    ("high_corruption", &weights.high_corruption),
                    ("high_wealth", &weights.high_wealth),
                    ("high_knowledge", &weights.high_knowledge),
                ] {
                    for (class, weight) in &table.0 {
                        if *weight > MAX_CLASS_WEIGHT {
                            issues.push(format!(
                                "{label} weight for {class} is {weight}, above {MAX_CLASS_WEIGHT}"
                            ));
                        }
                    }
                }
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for def in &self.invaders {
            if !seen.insert(def.id.as_str()) {
                issues.push(format!("duplicate invader id '{}'", def.id));
            }
            if def.stats.hp <= 0 {
                issues.push(format!("invader '{}' has non-positive hp", def.id));
            }
        }
        for (class, table) in &self.loot {
            for (label, span) in [
                ("gold", table.gold),
                ("crystals", table.crystals),
                ("essence", table.essence),
            ] {
                if span.min > span.max {
                    issues.push(format!("{class} loot {label} range is inverted"));
                }
            }
        }
        for (class, table) in &self.captivity {
            let pct = crate::math::to_percent(table.convert_chance);
            if !(5..=50).contains(&pct) {
                issues.push(format!("{class} convert chance {pct}% outside 5-50%"));
            }
        }
        issues
    }

    /// Built-in content used when no data files are supplied.
    #[must_use]
    pub fn standard() -> Self {
        use InvaderClass::{Cleric, Mage, Paladin, Ranger, Rogue, Scholar, Warrior};

        let invaders = vec![
            InvaderDefinition::new("sellsword", Warrior, "Sellsword", BaseStats::new(30, 6, 6, 4)),
            InvaderDefinition::new("shieldbearer", Warrior, "Shieldbearer", BaseStats::new(36, 5, 8, 3)),
            InvaderDefinition::new("cutpurse", Rogue, "Cutpurse", BaseStats::new(20, 7, 4, 7)),
            InvaderDefinition::new("hedge_mage", Mage, "Hedge Mage", BaseStats::new(18, 9, 3, 5)),
            InvaderDefinition::new("acolyte", Cleric, "Acolyte", BaseStats::new(22, 4, 5, 4)),
            InvaderDefinition::new("templar", Paladin, "Templar", BaseStats::new(34, 6, 7, 3))
                .with_ability(COURAGE_ABILITY),
            InvaderDefinition::new("tracker", Ranger, "Tracker", BaseStats::new(24, 7, 5, 6)),
            InvaderDefinition::new("archivist", Scholar, "Archivist", BaseStats::new(16, 4, 3, 5)),
        ];

        let composition_weights = CompositionWeights {
            balanced: ClassWeights::from_pairs(&[
                (Warrior, 3),
                (Rogue, 2),
                (Mage, 2),
                (Cleric, 2),
                (Paladin, 1),
                (Ranger, 2),
                (Scholar, 1),
            ]),
            high_corruption: ClassWeights::from_pairs(&[
                (Warrior, 2),
                (Cleric, 4),
                (Paladin, 5),
                (Ranger, 1),
            ]),
            high_wealth: ClassWeights::from_pairs(&[
                (Warrior, 2),
                (Rogue, 5),
                (Ranger, 3),
            ]),
            high_knowledge: ClassWeights::from_pairs(&[
                (Warrior, 1),
                (Mage, 4),
                (Scholar, 5),
                (Cleric, 1),
            ]),
        };

        let loot = [
            (Warrior, LootTable { gold: Span::new(10, 20), crystals: Span::new(0, 1), essence: Span::new(0, 0) }),
            (Rogue, LootTable { gold: Span::new(15, 30), crystals: Span::new(0, 2), essence: Span::new(0, 0) }),
            (Mage, LootTable { gold: Span::new(8, 15), crystals: Span::new(1, 3), essence: Span::new(1, 2) }),
            (Cleric, LootTable { gold: Span::new(8, 12), crystals: Span::new(0, 1), essence: Span::new(2, 4) }),
            (Paladin, LootTable { gold: Span::new(12, 25), crystals: Span::new(0, 1), essence: Span::new(1, 3) }),
            (Ranger, LootTable { gold: Span::new(10, 18), crystals: Span::new(0, 1), essence: Span::new(0, 1) }),
            (Scholar, LootTable { gold: Span::new(5, 10), crystals: Span::new(2, 4), essence: Span::new(0, 2) }),
        ]
        .into_iter()
        .collect();

        let captivity = [
            (Warrior, CaptivityTable { ransom: Span::new(30, 50), convert_chance: from_percent(30) }),
            (Rogue, CaptivityTable { ransom: Span::new(20, 40), convert_chance: from_percent(50) }),
            (Mage, CaptivityTable { ransom: Span::new(40, 70), convert_chance: from_percent(20) }),
            (Cleric, CaptivityTable { ransom: Span::new(35, 60), convert_chance: from_percent(10) }),
            (Paladin, CaptivityTable { ransom: Span::new(50, 90), convert_chance: from_percent(5) }),
            (Ranger, CaptivityTable { ransom: Span::new(25, 45), convert_chance: from_percent(35) }),
            (Scholar, CaptivityTable { ransom: Span::new(45, 80), convert_chance: from_percent(25) }),
        ]
        .into_iter()
        .collect();

        let prisoner_names = [
            "Aldric", "Brenna", "Corwin", "Dagny", "Edric", "Fiora", "Garrick", "Hilde",
            "Isolde", "Jorund", "Kestrel", "Lysa",
        ]
        .iter()
        .map(|name| (*name).to_string())
        .collect();

        Self {
            invaders,
            composition_weights: Some(composition_weights),
            loot,
            captivity,
            prisoner_names,
        }
    }
}
