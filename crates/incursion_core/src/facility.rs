//! Facility-side collaborators consumed by the invasion core.
//!
//! The room editor and the resource ledger live outside this crate. What
//! the core needs from them is captured here as plain data
//! ([`FacilityLayout`]) and a narrow trait ([`ResourceLedger`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::BaseStats;

/// Unique identifier for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room#{}", self.0)
    }
}

/// Integer tile coordinate on the battle board.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TilePos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TilePos {
    /// Create a tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another tile.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// The four cardinal neighbours in a fixed order (north, east, south, west).
    #[must_use]
    pub const fn cardinal_neighbors(self) -> [Self; 4] {
        [
            Self::new(self.x, self.y - 1),
            Self::new(self.x + 1, self.y),
            Self::new(self.x, self.y + 1),
            Self::new(self.x - 1, self.y),
        ]
    }

    /// True if `other` is exactly one cardinal step away.
    #[must_use]
    pub const fn is_cardinal_adjacent(self, other: Self) -> bool {
        self.manhattan(other) == 1
    }
}

/// What a room is used for. Drives objective eligibility and morale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoomKind {
    /// Where invaders arrive and where they flee to.
    Entrance,
    /// Plain connective room.
    Corridor,
    /// Holds the altar.
    Altar,
    /// Gold storage.
    Treasury,
    /// Research storage.
    Library,
    /// Corruption shrine.
    Shrine,
    /// Holds captured invaders.
    Prison,
    /// Defender quarters.
    Barracks,
    /// Essence source.
    EssenceWell,
}

impl RoomKind {
    /// Rooms whose capture rallies invaders more than usual.
    #[must_use]
    pub const fn is_high_value(self) -> bool {
        matches!(self, Self::Treasury | Self::Library | Self::EssenceWell)
    }
}

/// One room of the facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Unique identifier.
    pub id: RoomId,
    /// Purpose.
    pub kind: RoomKind,
    /// Representative tile on the battle board.
    pub position: TilePos,
    /// Fear level; zero means not frightening.
    #[serde(default)]
    pub fear_level: i32,
    /// Whether a trap fires when an invader enters.
    #[serde(default)]
    pub has_trap: bool,
}

impl Room {
    /// Create a room with no fear and no trap.
    #[must_use]
    pub const fn new(id: RoomId, kind: RoomKind, position: TilePos) -> Self {
        Self {
            id,
            kind,
            position,
            fear_level: 0,
            has_trap: false,
        }
    }

    /// Builder method to set fear level.
    #[must_use]
    pub const fn with_fear(mut self, fear_level: i32) -> Self {
        self.fear_level = fear_level;
        self
    }

    /// Builder method to add a trap.
    #[must_use]
    pub const fn with_trap(mut self) -> Self {
        self.has_trap = true;
        self
    }
}

/// Undirected hallway between two rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// One end.
    pub a: RoomId,
    /// Other end.
    pub b: RoomId,
    /// Traversal cost (hallway length).
    pub cost: u32,
}

impl Connection {
    /// Create a connection.
    #[must_use]
    pub const fn new(a: RoomId, b: RoomId, cost: u32) -> Self {
        Self { a, b, cost }
    }
}

/// A facility-controlled combat unit stationed in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenderSpec {
    /// Unique identifier.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Room the defender starts in.
    pub room: RoomId,
    /// Combat statistics.
    pub stats: BaseStats,
}

/// Everything the invasion needs to know about the facility's shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FacilityLayout {
    /// Board width in tiles.
    pub width: i32,
    /// Board height in tiles.
    pub height: i32,
    /// All rooms.
    pub rooms: Vec<Room>,
    /// Hallways.
    pub connections: Vec<Connection>,
    /// Room holding the altar, if one has been built.
    #[serde(default)]
    pub altar_room: Option<RoomId>,
    /// Room invaders arrive in. Falls back to the first room.
    #[serde(default)]
    pub entrance_room: Option<RoomId>,
    /// Stationed defenders.
    #[serde(default)]
    pub defenders: Vec<DefenderSpec>,
}

impl FacilityLayout {
    /// Look up a room.
    #[must_use]
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// First room of the given kind, by id.
    #[must_use]
    pub fn first_room_of(&self, kind: RoomKind) -> Option<&Room> {
        self.rooms
            .iter()
            .filter(|r| r.kind == kind)
            .min_by_key(|r| r.id)
    }

    /// The room invaders arrive in.
    #[must_use]
    pub fn entrance(&self) -> Option<&Room> {
        self.entrance_room
            .and_then(|id| self.room(id))
            .or_else(|| self.first_room_of(RoomKind::Entrance))
            .or_else(|| self.rooms.iter().min_by_key(|r| r.id))
    }

    /// Room whose representative tile is `pos`.
    #[must_use]
    pub fn room_at(&self, pos: TilePos) -> Option<&Room> {
        self.rooms.iter().find(|r| r.position == pos)
    }

    /// Room whose tile is `pos` or one cardinal step from it; the closest
    /// wins, then the lowest id.
    #[must_use]
    pub fn room_near(&self, pos: TilePos) -> Option<&Room> {
        self.rooms
            .iter()
            .filter(|r| r.position.manhattan(pos) <= 1)
            .min_by_key(|r| (r.position.manhattan(pos), r.id))
    }

    /// Whether a tile lies on the board.
    #[must_use]
    pub const fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Number of rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// Stockpiled resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resource {
    /// Currency.
    Gold,
    /// Building material.
    Crystals,
    /// Magical fuel.
    Essence,
    /// Volatile energy.
    Flux,
    /// Defender upkeep.
    Food,
    /// Accumulated knowledge.
    Research,
    /// Dark influence.
    Corruption,
}

impl Resource {
    /// All resources in a stable order.
    pub const ALL: [Self; 7] = [
        Self::Gold,
        Self::Crystals,
        Self::Essence,
        Self::Flux,
        Self::Food,
        Self::Research,
        Self::Corruption,
    ];
}

/// Signed changes to several resources at once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceDelta(pub BTreeMap<Resource, i64>);

impl ResourceDelta {
    /// Empty delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` of `resource` (negative to debit).
    pub fn add(&mut self, resource: Resource, amount: i64) {
        if amount == 0 {
            return;
        }
        let entry = self.0.entry(resource).or_insert(0);
        *entry += amount;
        if *entry == 0 {
            self.0.remove(&resource);
        }
    }

    /// Builder form of [`Self::add`].
    #[must_use]
    pub fn with(mut self, resource: Resource, amount: i64) -> Self {
        self.add(resource, amount);
        self
    }

    /// Change for one resource.
    #[must_use]
    pub fn get(&self, resource: Resource) -> i64 {
        self.0.get(&resource).copied().unwrap_or(0)
    }

    /// Merge another delta into this one.
    pub fn merge(&mut self, other: &ResourceDelta) {
        for (&resource, &amount) in &other.0 {
            self.add(resource, amount);
        }
    }

    /// True if nothing changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The resource ledger collaborator.
pub trait ResourceLedger {
    /// Current level of a resource.
    fn level(&self, resource: Resource) -> i64;

    /// Effective maximum of a resource.
    fn maximum(&self, resource: Resource) -> i64;

    /// Apply signed changes, clamped to `[0, maximum]`.
    fn apply(&mut self, delta: &ResourceDelta);
}

/// In-memory ledger with per-resource caps.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockLedger {
    levels: BTreeMap<Resource, i64>,
    maxima: BTreeMap<Resource, i64>,
}

impl StockLedger {
    /// Default cap for resources without an explicit maximum.
    pub const DEFAULT_MAXIMUM: i64 = 1000;

    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a level and cap.
    #[must_use]
    pub fn with(mut self, resource: Resource, level: i64, maximum: i64) -> Self {
        self.maxima.insert(resource, maximum.max(0));
        self.levels.insert(resource, level.clamp(0, maximum.max(0)));
        self
    }
}

impl ResourceLedger for StockLedger {
    fn level(&self, resource: Resource) -> i64 {
        self.levels.get(&resource).copied().unwrap_or(0)
    }

    fn maximum(&self, resource: Resource) -> i64 {
        self.maxima
            .get(&resource)
            .copied()
            .unwrap_or(Self::DEFAULT_MAXIMUM)
    }

    fn apply(&mut self, delta: &ResourceDelta) {
        for (&resource, &amount) in &delta.0 {
            let next = (self.level(resource) + amount).clamp(0, self.maximum(resource));
            self.levels.insert(resource, next);
        }
    }
}
