//! Test fixtures and helpers.
//!
//! A small but complete dungeon, a stocked ledger, parties built from the
//! standard catalog, and ready-to-tick services.

use fixed::types::I32F32;

use incursion_core::catalog::{BaseStats, Catalog, InvaderClass};
use incursion_core::facility::{
    Connection, DefenderSpec, FacilityLayout, Resource, Room, RoomId, RoomKind, StockLedger,
    TilePos,
};
use incursion_core::invader::{InvaderId, InvaderInstance};
use incursion_core::objectives::{assign_invasion_objectives, ObjectiveContext};
use incursion_core::outcome::InvasionState;
use incursion_core::service::{FacilityState, InvasionService};
use incursion_core::tuning::InvasionTuning;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Nine rooms: entrance, corridor hub, two wings and the altar at the far end.
///
/// ```text
///  3 Barracks ── 4 Treasury ── 8 Essence well (fear 4, trap)
///     |                             \
///  1 Entrance ── 2 Corridor          9 Altar
///     |                             /
///  6 Shrine (fear 3) ── 5 Library ── 7 Prison
/// ```
#[must_use]
pub fn sample_layout() -> FacilityLayout {
    FacilityLayout {
        width: 16,
        height: 9,
        rooms: vec![
            Room::new(RoomId(1), RoomKind::Entrance, TilePos::new(0, 4)),
            Room::new(RoomId(2), RoomKind::Corridor, TilePos::new(4, 4)),
            Room::new(RoomId(3), RoomKind::Barracks, TilePos::new(4, 1)),
            Room::new(RoomId(4), RoomKind::Treasury, TilePos::new(8, 1)),
            Room::new(RoomId(5), RoomKind::Library, TilePos::new(8, 7)),
            Room::new(RoomId(6), RoomKind::Shrine, TilePos::new(4, 7)).with_fear(3),
            Room::new(RoomId(7), RoomKind::Prison, TilePos::new(12, 7)),
            Room::new(RoomId(8), RoomKind::EssenceWell, TilePos::new(12, 1))
                .with_fear(4)
                .with_trap(),
            Room::new(RoomId(9), RoomKind::Altar, TilePos::new(14, 4)),
        ],
        connections: vec![
            Connection::new(RoomId(1), RoomId(2), 4),
            Connection::new(RoomId(2), RoomId(3), 3),
            Connection::new(RoomId(2), RoomId(6), 3),
            Connection::new(RoomId(3), RoomId(4), 4),
            Connection::new(RoomId(6), RoomId(5), 4),
            Connection::new(RoomId(4), RoomId(8), 4),
            Connection::new(RoomId(5), RoomId(7), 4),
            Connection::new(RoomId(8), RoomId(9), 4),
            Connection::new(RoomId(7), RoomId(9), 4),
        ],
        altar_room: Some(RoomId(9)),
        entrance_room: Some(RoomId(1)),
        defenders: vec![
            DefenderSpec {
                id: 1,
                name: "Gargoyle".to_string(),
                room: RoomId(3),
                stats: BaseStats::new(40, 8, 6, 5),
            },
            DefenderSpec {
                id: 2,
                name: "Imp".to_string(),
                room: RoomId(6),
                stats: BaseStats::new(20, 6, 3, 8),
            },
        ],
    }
}

/// Linear dungeon with no defenders: entrance, corridor, altar.
#[must_use]
pub fn undefended_layout() -> FacilityLayout {
    FacilityLayout {
        width: 10,
        height: 3,
        rooms: vec![
            Room::new(RoomId(1), RoomKind::Entrance, TilePos::new(0, 1)),
            Room::new(RoomId(2), RoomKind::Corridor, TilePos::new(4, 1)),
            Room::new(RoomId(3), RoomKind::Altar, TilePos::new(8, 1)),
        ],
        connections: vec![
            Connection::new(RoomId(1), RoomId(2), 4),
            Connection::new(RoomId(2), RoomId(3), 4),
        ],
        altar_room: Some(RoomId(3)),
        entrance_room: Some(RoomId(1)),
        defenders: Vec::new(),
    }
}

/// Ledger with a little of everything.
#[must_use]
pub fn sample_ledger() -> StockLedger {
    StockLedger::new()
        .with(Resource::Gold, 300, 1000)
        .with(Resource::Crystals, 80, 500)
        .with(Resource::Essence, 60, 500)
        .with(Resource::Flux, 40, 500)
        .with(Resource::Food, 100, 500)
        .with(Resource::Research, 200, 1000)
        .with(Resource::Corruption, 20, 100)
}

/// Fresh facility over [`sample_layout`] and [`sample_ledger`].
#[must_use]
pub fn sample_facility(tuning: &InvasionTuning) -> FacilityState {
    FacilityState::new(sample_layout(), sample_ledger(), tuning)
}

/// Service over [`sample_facility`] with the standard catalog and tuning.
#[must_use]
pub fn sample_service(seed: &str) -> InvasionService {
    let tuning = InvasionTuning::default();
    InvasionService::new(sample_facility(&tuning), Catalog::standard(), tuning, seed)
}

/// One invader per class in `classes`, built from the standard catalog.
///
/// Ids start at 1. Classes without a standard definition are skipped.
#[must_use]
pub fn party(classes: &[InvaderClass]) -> Vec<InvaderInstance> {
    let catalog = Catalog::standard();
    classes
        .iter()
        .filter_map(|class| catalog.invaders.iter().find(|d| d.class == *class))
        .enumerate()
        .map(|(i, def)| InvaderInstance::from_definition(InvaderId(i as u32 + 1), def))
        .collect()
}

/// Invasion over [`sample_layout`] with seeded objectives and default tuning.
#[must_use]
pub fn sample_invasion(invaders: Vec<InvaderInstance>, seed: &str) -> InvasionState {
    let layout = sample_layout();
    let tuning = InvasionTuning::default();
    let objectives = assign_invasion_objectives(&ObjectiveContext::from_layout(&layout, 0), seed);
    InvasionState::new("inv-test", 20, invaders, objectives, layout.defenders.len() as u32)
        .with_max_turns(tuning.max_turns)
        .with_altar(tuning.altar_max_hp)
}
