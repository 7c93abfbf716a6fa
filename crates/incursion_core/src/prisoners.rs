//! Captured invaders and what the facility can do with them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{BaseStats, Catalog, InvaderClass};
use crate::facility::{Resource, ResourceDelta};
use crate::invader::InvaderInstance;
use crate::rng::RollSource;
use crate::tuning::InvasionTuning;

/// Unique identifier for a captured prisoner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrisonerId(pub u32);

impl fmt::Display for PrisonerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prisoner#{}", self.0)
    }
}

/// An invader held by the facility after an invasion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapturedPrisoner {
    /// Identifier.
    pub id: PrisonerId,
    /// Class of the captured invader.
    pub invader_class: InvaderClass,
    /// Name.
    pub name: String,
    /// Stats at the time of capture.
    pub stats: BaseStats,
    /// Day of capture.
    pub capture_day: u32,
}

/// The five ways to dispose of a prisoner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrisonerAction {
    /// Kill for corruption.
    Execute,
    /// Release for gold.
    Ransom,
    /// Attempt to turn into a defender.
    Convert,
    /// Kill for essence and corruption.
    Sacrifice,
    /// Study for research.
    Experiment,
}

impl PrisonerAction {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Ransom => "ransom",
            Self::Convert => "convert",
            Self::Sacrifice => "sacrifice",
            Self::Experiment => "experiment",
        }
    }
}

/// Consequences of handling one prisoner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrisonerOutcome {
    /// Who was handled.
    pub prisoner: PrisonerId,
    /// What was done.
    pub action: PrisonerAction,
    /// Resource changes for the ledger.
    pub resources: ResourceDelta,
    /// The prisoner now serves the facility.
    pub converted: bool,
    /// The prisoner leaves the cells.
    pub consumed: bool,
}

/// Dispatch a prisoner action.
///
/// Conversion costs essence whether or not it takes; a failed conversion
/// keeps the prisoner in the cells.
pub fn handle_prisoner(
    prisoner: &CapturedPrisoner,
    action: PrisonerAction,
    catalog: &Catalog,
    tuning: &InvasionTuning,
    rng: &mut impl RollSource,
) -> PrisonerOutcome {
    let captivity = catalog.captivity_for(prisoner.invader_class);
    let mut resources = ResourceDelta::new();
    let mut converted = false;
    let consumed = match action {
        PrisonerAction::Execute => {
            resources.add(Resource::Corruption, tuning.execute_corruption);
            true
        }
        PrisonerAction::Ransom => {
            let gold = rng.range_inclusive(captivity.ransom.min, captivity.ransom.max);
            resources.add(Resource::Gold, i64::from(gold));
            true
        }
        PrisonerAction::Convert => {
            resources.add(Resource::Essence, -tuning.convert_essence_cost);
            converted = rng.chance(captivity.convert_chance);
            converted
        }
        PrisonerAction::Sacrifice => {
            resources.add(Resource::Essence, tuning.sacrifice_essence);
            resources.add(Resource::Corruption, tuning.sacrifice_corruption);
            true
        }
        PrisonerAction::Experiment => {
            resources.add(Resource::Research, tuning.experiment_research);
            true
        }
    };

    tracing::info!(
        prisoner = %prisoner.id,
        action = action.as_str(),
        converted,
        "Prisoner handled"
    );

    PrisonerOutcome {
        prisoner: prisoner.id,
        action,
        resources,
        converted,
        consumed,
    }
}

/// Roll capture for every invader that survived the invasion.
///
/// Killed invaders are never captured. Ids are assigned from `next_id`
/// upward in invader order.
pub fn roll_captures(
    invaders: &[InvaderInstance],
    catalog: &Catalog,
    tuning: &InvasionTuning,
    day: u32,
    next_id: u32,
    rng: &mut impl RollSource,
) -> Vec<CapturedPrisoner> {
    let mut captured = Vec::new();
    for invader in invaders.iter().filter(|i| i.is_alive()) {
        if !rng.chance(tuning.capture_chance) {
            continue;
        }
        let name = if catalog.prisoner_names.is_empty() {
            invader.name.clone()
        } else {
            let given = &catalog.prisoner_names[rng.pick_index(catalog.prisoner_names.len())];
            format!("{given} the {}", invader.name)
        };
        captured.push(CapturedPrisoner {
            id: PrisonerId(next_id + captured.len() as u32),
            invader_class: invader.class,
            name,
            stats: invader.stats(),
            capture_day: day,
        });
    }
    captured
}
