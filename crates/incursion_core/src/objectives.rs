//! Invasion goals: one primary altar objective plus up to two secondaries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::facility::{FacilityLayout, RoomId, RoomKind};
use crate::math::{round_hundredths, Fixed};
use crate::rng::{InvasionRng, RollSource};

/// Secondary objectives chosen per invasion.
pub const MAX_SECONDARY_OBJECTIVES: usize = 2;

/// Full progress.
pub const COMPLETE: i32 = 100;

/// Smallest facility worth scouting.
pub const SCOUT_MIN_ROOMS: u32 = 3;

/// Objective templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectiveKind {
    /// Primary: bring the altar down.
    DestroyAltar,
    /// Kill the facility's defenders.
    SlayDefenders,
    /// Stand in the treasury.
    LootTreasury,
    /// Stand in the library.
    RaidLibrary,
    /// Stand in the shrine.
    DefileShrine,
    /// Reach the prison while it holds captives.
    RescuePrisoners,
    /// Stand in the essence well.
    DrainEssence,
    /// Walk through most of the facility.
    ScoutDungeon,
}

impl ObjectiveKind {
    /// The secondary templates in a stable order.
    pub const SECONDARY: [Self; 7] = [
        Self::SlayDefenders,
        Self::LootTreasury,
        Self::RaidLibrary,
        Self::DefileShrine,
        Self::RescuePrisoners,
        Self::DrainEssence,
        Self::ScoutDungeon,
    ];

    /// Snake-case identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DestroyAltar => "destroy_altar",
            Self::SlayDefenders => "slay_defenders",
            Self::LootTreasury => "loot_treasury",
            Self::RaidLibrary => "raid_library",
            Self::DefileShrine => "defile_shrine",
            Self::RescuePrisoners => "rescue_prisoners",
            Self::DrainEssence => "drain_essence",
            Self::ScoutDungeon => "scout_dungeon",
        }
    }

    /// Room kind that must be occupied to progress, if any.
    #[must_use]
    pub const fn room_kind(self) -> Option<RoomKind> {
        match self {
            Self::DestroyAltar => Some(RoomKind::Altar),
            Self::LootTreasury => Some(RoomKind::Treasury),
            Self::RaidLibrary => Some(RoomKind::Library),
            Self::DefileShrine => Some(RoomKind::Shrine),
            Self::RescuePrisoners => Some(RoomKind::Prison),
            Self::DrainEssence => Some(RoomKind::EssenceWell),
            Self::SlayDefenders | Self::ScoutDungeon => None,
        }
    }

    /// Whether this template can be assigned against `ctx`.
    #[must_use]
    pub fn is_eligible(self, ctx: &ObjectiveContext) -> bool {
        match self {
            Self::DestroyAltar => true,
            Self::SlayDefenders => ctx.defender_count > 0,
            Self::RescuePrisoners => ctx.prisoner_count > 0 && ctx.room_of(RoomKind::Prison).is_some(),
            Self::ScoutDungeon => ctx.room_count >= SCOUT_MIN_ROOMS,
            Self::LootTreasury | Self::RaidLibrary | Self::DefileShrine | Self::DrainEssence => {
                self.target(ctx).is_some()
            }
        }
    }

    /// Target room for this template, if it has one.
    #[must_use]
    pub fn target(self, ctx: &ObjectiveContext) -> Option<RoomId> {
        match self {
            Self::DestroyAltar => ctx.altar_room,
            other => other.room_kind().and_then(|kind| ctx.room_of(kind)),
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the assigner needs to know about the facility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveContext {
    /// Altar room, if one was built.
    pub altar_room: Option<RoomId>,
    /// First room of each kind present.
    pub rooms_by_kind: Vec<(RoomKind, RoomId)>,
    /// Defenders stationed.
    pub defender_count: u32,
    /// Prisoners held.
    pub prisoner_count: u32,
    /// Room count.
    pub room_count: u32,
}

impl ObjectiveContext {
    /// Gather the context from a facility layout.
    #[must_use]
    pub fn from_layout(layout: &FacilityLayout, prisoner_count: u32) -> Self {
        let mut rooms_by_kind: Vec<(RoomKind, RoomId)> = Vec::new();
        for room in &layout.rooms {
            if rooms_by_kind.iter().any(|(kind, _)| *kind == room.kind) {
                continue;
            }
            if let Some(first) = layout.first_room_of(room.kind) {
                rooms_by_kind.push((room.kind, first.id));
            }
        }
        Self {
            altar_room: layout.altar_room,
            rooms_by_kind,
            defender_count: layout.defenders.len() as u32,
            prisoner_count,
            room_count: layout.room_count() as u32,
        }
    }

    /// Lowest-id room of `kind`, as [`FacilityLayout::first_room_of`] picks it.
    #[must_use]
    pub fn room_of(&self, kind: RoomKind) -> Option<RoomId> {
        self.rooms_by_kind
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
    }
}

/// One assigned goal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvasionObjective {
    /// Identifier, unique within the invasion.
    pub id: String,
    /// Template.
    pub kind: ObjectiveKind,
    /// Target room; `None` for roomless goals or a missing altar.
    pub target: Option<RoomId>,
    /// Exactly one objective per invasion is primary.
    pub is_primary: bool,
    /// Sticky once set.
    pub is_completed: bool,
    /// Progress, 0-100.
    pub progress: i32,
}

impl InvasionObjective {
    /// Fresh objective with zero progress.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ObjectiveKind, target: Option<RoomId>) -> Self {
        Self {
            id: id.into(),
            kind,
            target,
            is_primary: kind == ObjectiveKind::DestroyAltar,
            is_completed: false,
            progress: 0,
        }
    }

    /// The same objective at a new progress value.
    ///
    /// Clamps to `[0, 100]`. A completed objective no longer changes.
    #[must_use]
    pub fn with_progress(&self, progress: i32) -> Self {
        let mut next = self.clone();
        if next.is_completed {
            return next;
        }
        next.progress = progress.clamp(0, COMPLETE);
        next.is_completed = next.progress >= COMPLETE;
        next
    }
}

/// Pick objectives for an invasion, seeded by `seed`.
#[must_use]
pub fn assign_invasion_objectives(ctx: &ObjectiveContext, seed: &str) -> Vec<InvasionObjective> {
    let mut rng = InvasionRng::derive(seed, "objectives");
    assign_with(ctx, &mut rng)
}

/// Objective assignment against an injected roll source.
pub fn assign_with(ctx: &ObjectiveContext, rng: &mut impl RollSource) -> Vec<InvasionObjective> {
    let altar = ObjectiveKind::DestroyAltar.target(ctx);
    if altar.is_none() {
        tracing::warn!("No altar in facility; primary objective has no target");
    }
    let mut objectives = vec![InvasionObjective::new(
        "obj-1",
        ObjectiveKind::DestroyAltar,
        altar,
    )];

    let mut pool: Vec<ObjectiveKind> = ObjectiveKind::SECONDARY
        .into_iter()
        .filter(|kind| kind.is_eligible(ctx))
        .collect();
    rng.shuffle(&mut pool);

    for kind in pool.into_iter().take(MAX_SECONDARY_OBJECTIVES) {
        let id = format!("obj-{}", objectives.len() + 1);
        objectives.push(InvasionObjective::new(id, kind, kind.target(ctx)));
    }
    objectives
}

/// Replace the progress of objective `id`, returning the new list.
///
/// Unknown ids leave the list unchanged.
#[must_use]
pub fn update_objective_progress(
    objectives: &[InvasionObjective],
    id: &str,
    progress: i32,
) -> Vec<InvasionObjective> {
    objectives
        .iter()
        .map(|o| if o.id == id { o.with_progress(progress) } else { o.clone() })
        .collect()
}

/// Completed secondary objectives.
#[must_use]
pub fn completed_secondaries(objectives: &[InvasionObjective]) -> usize {
    objectives
        .iter()
        .filter(|o| !o.is_primary && o.is_completed)
        .count()
}

/// Who won, from the facility's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvasionOutcome {
    /// The facility held.
    Victory,
    /// The altar fell.
    Defeat,
}

impl InvasionOutcome {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Victory => "victory",
            Self::Defeat => "defeat",
        }
    }
}

/// Outcome plus the reward multiplier derived from objectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveResolution {
    /// Victory or defeat.
    pub outcome: InvasionOutcome,
    /// Scales victory rewards; zero on defeat.
    #[serde(with = "crate::math::fixed_serde")]
    pub reward_multiplier: Fixed,
    /// Secondaries the invaders completed.
    pub completed: usize,
    /// Secondaries the facility prevented.
    pub prevented: usize,
}

/// Turn objectives and the altar's fate into an outcome.
///
/// A destroyed altar is a defeat with no reward, whatever else happened.
/// Otherwise each prevented secondary adds a quarter and each completed one
/// removes a quarter, floored at zero and rounded to hundredths.
#[must_use]
pub fn resolve_invasion_outcome(
    objectives: &[InvasionObjective],
    altar_destroyed: bool,
) -> ObjectiveResolution {
    let completed = completed_secondaries(objectives);
    let prevented = objectives.iter().filter(|o| !o.is_primary).count() - completed;

    if altar_destroyed {
        return ObjectiveResolution {
            outcome: InvasionOutcome::Defeat,
            reward_multiplier: Fixed::ZERO,
            completed,
            prevented,
        };
    }

    let quarter = Fixed::from_num(0.25);
    let raw = Fixed::ONE + quarter * Fixed::from_num(prevented as u32)
        - quarter * Fixed::from_num(completed as u32);
    ObjectiveResolution {
        outcome: InvasionOutcome::Victory,
        reward_multiplier: round_hundredths(raw.max(Fixed::ZERO)),
        completed,
        prevented,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::{Room, TilePos};
    use crate::rng::ScriptedRolls;

    fn context() -> ObjectiveContext {
        ObjectiveContext {
            altar_room: Some(RoomId(9)),
            rooms_by_kind: vec![
                (RoomKind::Altar, RoomId(9)),
                (RoomKind::Treasury, RoomId(4)),
                (RoomKind::Library, RoomId(5)),
            ],
            defender_count: 2,
            prisoner_count: 0,
            room_count: 6,
        }
    }

    #[test]
    fn test_exactly_one_primary() {
        let objectives = assign_invasion_objectives(&context(), "s1");
        assert_eq!(objectives.iter().filter(|o| o.is_primary).count(), 1);
        assert_eq!(objectives[0].kind, ObjectiveKind::DestroyAltar);
        assert_eq!(objectives[0].target, Some(RoomId(9)));
        assert_eq!(objectives.len(), 3);
        assert_ne!(objectives[1].kind, objectives[2].kind);
    }

    #[test]
    fn test_eligibility_filters_pool() {
        let ctx = context();
        assert!(ObjectiveKind::LootTreasury.is_eligible(&ctx));
        assert!(!ObjectiveKind::DefileShrine.is_eligible(&ctx));
        assert!(!ObjectiveKind::RescuePrisoners.is_eligible(&ctx));
        assert!(ObjectiveKind::ScoutDungeon.is_eligible(&ctx));
        assert!(ObjectiveKind::SlayDefenders.is_eligible(&ctx));
    }

    #[test]
    fn test_no_altar_and_empty_pool() {
        let ctx = ObjectiveContext::default();
        let mut rolls = ScriptedRolls::new([Fixed::ZERO]);
        let objectives = assign_with(&ctx, &mut rolls);
        assert_eq!(objectives.len(), 1);
        assert_eq!(objectives[0].target, None);
    }

    #[test]
    fn test_same_seed_same_objectives() {
        let a = assign_invasion_objectives(&context(), "seed-a");
        let b = assign_invasion_objectives(&context(), "seed-a");
        assert_eq!(a, b);
    }

    #[test]
    fn test_progress_clamps_and_completion_sticks() {
        let objective = InvasionObjective::new("obj-2", ObjectiveKind::LootTreasury, Some(RoomId(4)));
        let over = objective.with_progress(140);
        assert_eq!(over.progress, 100);
        assert!(over.is_completed);
        let after = over.with_progress(10);
        assert_eq!(after.progress, 100);
        assert!(after.is_completed);
        assert_eq!(objective.with_progress(-20).progress, 0);
    }

    #[test]
    fn test_update_by_id() {
        let objectives = assign_invasion_objectives(&context(), "s1");
        let updated = update_objective_progress(&objectives, "obj-2", 50);
        assert_eq!(updated[1].progress, 50);
        assert_eq!(updated[0], objectives[0]);
        assert_eq!(update_objective_progress(&objectives, "nope", 50), objectives);
    }

    #[test]
    fn test_altar_destroyed_is_always_defeat() {
        let mut objectives = assign_invasion_objectives(&context(), "s1");
        objectives[1] = objectives[1].with_progress(100);
        for completed in [false, true] {
            if completed {
                objectives[2] = objectives[2].with_progress(100);
            }
            let result = resolve_invasion_outcome(&objectives, true);
            assert_eq!(result.outcome, InvasionOutcome::Defeat);
            assert_eq!(result.reward_multiplier, Fixed::ZERO);
        }
    }

    #[test]
    fn test_reward_multiplier() {
        let objectives = assign_invasion_objectives(&context(), "s1");
        let clean = resolve_invasion_outcome(&objectives, false);
        assert_eq!(clean.outcome, InvasionOutcome::Victory);
        assert_eq!(clean.reward_multiplier, Fixed::from_num(1.5));

        let mut one_lost = objectives.clone();
        one_lost[1] = one_lost[1].with_progress(100);
        assert_eq!(
            resolve_invasion_outcome(&one_lost, false).reward_multiplier,
            Fixed::ONE
        );

        one_lost[2] = one_lost[2].with_progress(100);
        assert_eq!(
            resolve_invasion_outcome(&one_lost, false).reward_multiplier,
            Fixed::from_num(0.5)
        );
    }

    #[test]
    fn test_context_from_layout() {
        let layout = FacilityLayout {
            rooms: vec![
                Room::new(RoomId(1), RoomKind::Entrance, TilePos::new(0, 0)),
                Room::new(RoomId(2), RoomKind::Prison, TilePos::new(2, 0)),
                Room::new(RoomId(3), RoomKind::Prison, TilePos::new(4, 0)),
            ],
            ..FacilityLayout::default()
        };
        let ctx = ObjectiveContext::from_layout(&layout, 2);
        assert_eq!(ctx.room_of(RoomKind::Prison), Some(RoomId(2)));
        assert!(ObjectiveKind::RescuePrisoners.is_eligible(&ctx));
        assert_eq!(ctx.altar_room, None);
    }

    #[test]
    fn test_context_targets_lowest_room_id() {
        let layout = FacilityLayout {
            rooms: vec![
                Room::new(RoomId(7), RoomKind::Treasury, TilePos::new(6, 0)),
                Room::new(RoomId(1), RoomKind::Entrance, TilePos::new(0, 0)),
                Room::new(RoomId(3), RoomKind::Treasury, TilePos::new(2, 0)),
            ],
            ..FacilityLayout::default()
        };
        let ctx = ObjectiveContext::from_layout(&layout, 0);
        assert_eq!(ctx.room_of(RoomKind::Treasury), Some(RoomId(3)));
        assert_eq!(
            ctx.room_of(RoomKind::Treasury),
            layout.first_room_of(RoomKind::Treasury).map(|r| r.id)
        );
        assert_eq!(ObjectiveKind::LootTreasury.target(&ctx), Some(RoomId(3)));
    }
}
