//! # Incursion Core
//!
//! Deterministic simulation of adventurer invasions into a player-built
//! dungeon.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (every roll comes from a seeded [`rng::RollSource`])
//! - No floating-point math (fractions use fixed-point)
//!
//! Given the same seed, layout, ledger and catalog, an invasion plays out
//! identically every time. That makes replays, determinism tests and
//! snapshot hashing possible.
//!
//! ## Crate Structure
//!
//! - [`scheduler`] - When invasions happen
//! - [`profile`], [`composition`] - Who invades
//! - [`objectives`] - What they want
//! - [`pathfinding`] - How they cross the dungeon
//! - [`turn`], [`ai`], [`combat`] - How they fight
//! - [`morale`] - When they break
//! - [`outcome`] - Who won
//! - [`rewards`], [`prisoners`] - What it cost
//! - [`battle`] - One invasion, round by round
//! - [`service`], [`channel`], [`events`] - The per-tick entry point

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod battle;
pub mod catalog;
pub mod channel;
pub mod combat;
pub mod composition;
pub mod error;
pub mod events;
pub mod facility;
pub mod invader;
pub mod math;
pub mod morale;
pub mod objectives;
pub mod outcome;
pub mod pathfinding;
pub mod prisoners;
pub mod profile;
pub mod rewards;
pub mod rng;
pub mod scheduler;
pub mod service;
pub mod tuning;
pub mod turn;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::battle::{Battle, RoundReport};
    pub use crate::catalog::{BaseStats, Catalog, InvaderClass, InvaderDefinition};
    pub use crate::error::{InvasionError, Result};
    pub use crate::events::{EventBus, InvasionEvent, InvasionListener};
    pub use crate::facility::{
        Connection, DefenderSpec, FacilityLayout, Resource, ResourceDelta, ResourceLedger, Room,
        RoomId, RoomKind, StockLedger, TilePos,
    };
    pub use crate::invader::{InvaderId, InvaderInstance};
    pub use crate::math::Fixed;
    pub use crate::objectives::{InvasionObjective, InvasionOutcome, ObjectiveKind};
    pub use crate::outcome::{DetailedInvasionResult, EndReason, InvasionState};
    pub use crate::prisoners::{CapturedPrisoner, PrisonerAction, PrisonerId};
    pub use crate::rng::{InvasionRng, RollSource};
    pub use crate::scheduler::{GameClock, InvasionSchedule};
    pub use crate::service::{FacilityState, InvasionService};
    pub use crate::tuning::InvasionTuning;
}
