//! Scenario loading and configuration.
//!
//! A scenario fixes everything a headless run needs apart from the seed:
//! the dungeon layout, starting stock, tuning overrides, forced invasions
//! and how long to simulate.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use incursion_core::catalog::Catalog;
use incursion_core::error::InvasionError;
use incursion_core::facility::{FacilityLayout, Resource, StockLedger};
use incursion_core::prisoners::PrisonerAction;
use incursion_core::scheduler::SpecialInvasion;
use incursion_core::service::{FacilityState, InvasionService};
use incursion_core::tuning::InvasionTuning;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Neither a file nor a bundled scenario.
    #[error("Unknown scenario: {0}")]
    Unknown(String),
    /// The scenario loaded but describes an unusable dungeon.
    #[error("Invalid scenario: {}", .0.join("; "))]
    Invalid(Vec<String>),
    /// The simulation rejected an operation.
    #[error(transparent)]
    Invasion(#[from] InvasionError),
}

const CRYPT: &str = include_str!("../data/scenarios/crypt.ron");
const OPEN_VAULT: &str = include_str!("../data/scenarios/open_vault.ron");

/// Names of the scenarios compiled into the binary.
pub const BUNDLED_SCENARIOS: [&str; 2] = ["crypt", "open_vault"];

fn default_days() -> u32 {
    60
}

fn default_maximum() -> i64 {
    StockLedger::DEFAULT_MAXIMUM
}

/// Starting level of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    /// Which resource.
    pub resource: Resource,
    /// Starting level.
    pub level: i64,
    /// Storage cap.
    #[serde(default = "default_maximum")]
    pub maximum: i64,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Days to simulate in `run` and `batch`.
    #[serde(default = "default_days")]
    pub days: u32,
    /// The dungeon.
    pub layout: FacilityLayout,
    /// Starting stock.
    #[serde(default)]
    pub stock: Vec<StockEntry>,
    /// Tuning overrides; omitted fields keep their defaults.
    #[serde(default)]
    pub tuning: InvasionTuning,
    /// Invasions forced onto specific days.
    #[serde(default)]
    pub special_invasions: Vec<SpecialInvasion>,
    /// Applied to every prisoner as soon as they are captured.
    #[serde(default)]
    pub prisoner_policy: Option<PrisonerAction>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Parse a scenario from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A scenario compiled into the binary.
    pub fn bundled(name: &str) -> Result<Self, ScenarioError> {
        match name {
            "crypt" => Self::from_ron_str(CRYPT),
            "open_vault" => Self::from_ron_str(OPEN_VAULT),
            other => Err(ScenarioError::Unknown(other.to_string())),
        }
    }

    /// Resolve a scenario argument: an existing file path, else a bundled name.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        if Path::new(name_or_path).is_file() {
            Self::load(name_or_path)
        } else {
            Self::bundled(name_or_path)
        }
    }

    /// Check the layout for problems that would make runs meaningless.
    ///
    /// Returns a list of human-readable issues; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let layout = &self.layout;
        let mut issues = Vec::new();

        if self.days == 0 {
            issues.push("days must be positive".to_string());
        }
        match layout.altar_room {
            None => issues.push("no altar room".to_string()),
            Some(id) if layout.room(id).is_none() => {
                issues.push(format!("altar {id} is not a room"));
            }
            Some(_) => {}
        }
        if layout.entrance().is_none() {
            issues.push("no entrance room".to_string());
        }
        for room in &layout.rooms {
            if !layout.in_bounds(room.position) {
                issues.push(format!("{} at {:?} is off the board", room.id, room.position));
            }
        }
        for connection in &layout.connections {
            for end in [connection.a, connection.b] {
                if layout.room(end).is_none() {
                    issues.push(format!("connection to unknown {end}"));
                }
            }
        }
        for defender in &layout.defenders {
            if layout.room(defender.room).is_none() {
                issues.push(format!("defender {} guards unknown {}", defender.name, defender.room));
            }
        }
        issues
    }

    /// Starting ledger from [`Scenario::stock`].
    #[must_use]
    pub fn ledger(&self) -> StockLedger {
        self.stock
            .iter()
            .fold(StockLedger::new(), |ledger, entry| {
                ledger.with(entry.resource, entry.level, entry.maximum)
            })
    }

    /// Build a fresh service for one seed, with the forced invasions queued.
    pub fn build_service(&self, catalog: Catalog, seed: &str) -> Result<InvasionService, ScenarioError> {
        let issues = self.validate();
        if !issues.is_empty() {
            return Err(ScenarioError::Invalid(issues));
        }
        let facility = FacilityState::new(self.layout.clone(), self.ledger(), &self.tuning);
        let mut service = InvasionService::new(facility, catalog, self.tuning.clone(), seed);
        for special in &self.special_invasions {
            service.queue_special_invasion(special.trigger_day, special.label.clone())?;
        }
        Ok(service)
    }
}

/// Load a catalog from a RON file, or the standard catalog when `path` is `None`.
pub fn load_catalog(path: Option<&Path>) -> Result<Catalog, ScenarioError> {
    let Some(path) = path else {
        return Ok(Catalog::standard());
    };
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(Catalog::from_ron_str(&contents)?)
}
