//! Invasion state and the end-of-turn win/loss check.
//!
//! Every mutator takes `&self` and returns the next state. Once
//! `is_active` is false the state is frozen: further mutators return an
//! unchanged copy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::invader::{InvaderId, InvaderInstance};
use crate::math::Fixed;
use crate::objectives::{
    completed_secondaries, resolve_invasion_outcome, InvasionObjective, InvasionOutcome,
    ObjectiveKind,
};

/// Secondaries the invaders must complete to win without the altar.
pub const SECONDARIES_TO_WIN: usize = 2;

/// Why an invasion ended. Variants are listed in check priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    /// Altar hp reached zero. Invaders win.
    AltarDestroyed,
    /// Enough secondaries completed. Invaders win.
    ObjectivesCompleted,
    /// Every invader is dead or gone. Defenders win.
    AllInvadersEliminated,
    /// Turn limit hit. Defenders win.
    TurnLimitReached,
}

impl EndReason {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AltarDestroyed => "altar_destroyed",
            Self::ObjectivesCompleted => "objectives_completed",
            Self::AllInvadersEliminated => "all_invaders_eliminated",
            Self::TurnLimitReached => "turn_limit_reached",
        }
    }

    /// Whether the invaders won.
    #[must_use]
    pub const fn invaders_won(self) -> bool {
        matches!(self, Self::AltarDestroyed | Self::ObjectivesCompleted)
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one running (or finished) invasion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvasionState {
    /// Identifier.
    pub invasion_id: String,
    /// Day the invasion started.
    pub day: u32,
    /// Turns played.
    pub current_turn: u32,
    /// Turn limit.
    pub max_turns: u32,
    /// Altar hit points, 0..=`altar_max_hp`.
    pub altar_hp: i32,
    /// Altar maximum.
    pub altar_max_hp: i32,
    /// The invading party.
    pub invaders: Vec<InvaderInstance>,
    /// Assigned objectives.
    pub objectives: Vec<InvasionObjective>,
    /// Defenders at the start.
    pub defender_count: u32,
    /// Defenders killed.
    pub defenders_lost: u32,
    /// Invaders killed.
    pub invaders_killed: u32,
    /// Invaders who escaped.
    pub invaders_fled: u32,
    /// Running.
    pub is_active: bool,
    /// Set when the invasion ends.
    pub end_reason: Option<EndReason>,
}

impl InvasionState {
    /// A fresh, active invasion at turn zero.
    #[must_use]
    pub fn new(
        invasion_id: impl Into<String>,
        day: u32,
        invaders: Vec<InvaderInstance>,
        objectives: Vec<InvasionObjective>,
        defender_count: u32,
    ) -> Self {
        Self {
            invasion_id: invasion_id.into(),
            day,
            current_turn: 0,
            max_turns: 30,
            altar_hp: 100,
            altar_max_hp: 100,
            invaders,
            objectives,
            defender_count,
            defenders_lost: 0,
            invaders_killed: 0,
            invaders_fled: 0,
            is_active: true,
            end_reason: None,
        }
    }

    /// Set the turn limit.
    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Set the altar's hit points (full health).
    #[must_use]
    pub const fn with_altar(mut self, max_hp: i32) -> Self {
        self.altar_max_hp = max_hp;
        self.altar_hp = max_hp;
        self
    }

    /// Look up an invader.
    #[must_use]
    pub fn invader(&self, id: InvaderId) -> Option<&InvaderInstance> {
        self.invaders.iter().find(|i| i.id == id)
    }

    /// Invaders still inside and alive.
    pub fn active_invaders(&self) -> impl Iterator<Item = &InvaderInstance> {
        self.invaders.iter().filter(|i| i.is_active())
    }

    /// Whether the altar is down.
    #[must_use]
    pub const fn is_altar_destroyed(&self) -> bool {
        self.altar_hp <= 0
    }

    fn frozen_or(&self, mutate: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        if next.is_active {
            mutate(&mut next);
        }
        next
    }

    /// Damage the altar, clamped at zero, and refresh the primary
    /// objective's progress.
    ///
    /// A primary objective without a target never progresses.
    #[must_use]
    pub fn damage_altar(&self, amount: i32) -> Self {
        self.frozen_or(|s| {
            s.altar_hp = (s.altar_hp - amount.max(0)).max(0);
            let progress = if s.altar_max_hp > 0 {
                (s.altar_max_hp - s.altar_hp) * 100 / s.altar_max_hp
            } else {
                0
            };
            for objective in &mut s.objectives {
                if objective.kind == ObjectiveKind::DestroyAltar && objective.target.is_some() {
                    *objective = objective.with_progress(progress);
                }
            }
        })
    }

    /// Replace the progress of objective `id`.
    #[must_use]
    pub fn update_objective(&self, id: &str, progress: i32) -> Self {
        self.frozen_or(|s| {
            s.objectives = crate::objectives::update_objective_progress(&s.objectives, id, progress);
        })
    }

    /// Move to the next turn.
    #[must_use]
    pub fn advance_invasion_turn(&self) -> Self {
        self.frozen_or(|s| s.current_turn += 1)
    }

    /// Record an invader's death. Killing the dead again is a no-op.
    #[must_use]
    pub fn mark_invader_killed(&self, id: InvaderId) -> Self {
        self.frozen_or(|s| {
            if let Some(invader) = s.invaders.iter_mut().find(|i| i.id == id && i.is_alive()) {
                invader.current_hp = 0;
                s.invaders_killed += 1;
            }
        })
    }

    /// Record an invader leaving the facility alive.
    #[must_use]
    pub fn mark_invader_fled(&self, id: InvaderId) -> Self {
        self.frozen_or(|s| {
            if let Some(invader) = s.invaders.iter_mut().find(|i| i.id == id && i.is_active()) {
                invader.fled = true;
                s.invaders_fled += 1;
            }
        })
    }

    /// Record a defender's death.
    #[must_use]
    pub fn record_defender_loss(&self) -> Self {
        self.frozen_or(|s| s.defenders_lost = (s.defenders_lost + 1).min(s.defender_count))
    }

    /// Replace the invader record with the same id (hp, room, effects).
    #[must_use]
    pub fn with_invader(&self, invader: InvaderInstance) -> Self {
        self.frozen_or(|s| {
            if let Some(slot) = s.invaders.iter_mut().find(|i| i.id == invader.id) {
                *slot = invader;
            }
        })
    }

    /// End the invasion. Only the first call has an effect.
    #[must_use]
    pub fn end_invasion(&self, reason: EndReason) -> Self {
        self.frozen_or(|s| {
            s.is_active = false;
            s.end_reason = Some(reason);
            tracing::info!(
                invasion_id = %s.invasion_id,
                turn = s.current_turn,
                reason = reason.as_str(),
                "Invasion ended"
            );
        })
    }

    /// Summary for the reward layer and the history log; `None` while the
    /// invasion is still running.
    ///
    /// An end reason the invaders won is a defeat with no reward, even when
    /// the altar still stands.
    #[must_use]
    pub fn result(&self) -> Option<DetailedInvasionResult> {
        let end_reason = self.end_reason?;
        let mut resolution = resolve_invasion_outcome(&self.objectives, self.is_altar_destroyed());
        if end_reason.invaders_won() {
            resolution.outcome = InvasionOutcome::Defeat;
            resolution.reward_multiplier = Fixed::ZERO;
        }
        Some(DetailedInvasionResult {
            invasion_id: self.invasion_id.clone(),
            day: self.day,
            outcome: resolution.outcome,
            end_reason,
            turns: self.current_turn,
            invader_count: self.invaders.len() as u32,
            invaders_killed: self.invaders_killed,
            invaders_fled: self.invaders_fled,
            defender_count: self.defender_count,
            defenders_lost: self.defenders_lost,
            secondaries_completed: completed_secondaries(&self.objectives) as u32,
            reward_multiplier: resolution.reward_multiplier,
        })
    }
}

/// First terminal condition that holds, in priority order.
#[must_use]
pub fn check_end_condition(state: &InvasionState) -> Option<EndReason> {
    if state.is_altar_destroyed() {
        return Some(EndReason::AltarDestroyed);
    }
    if completed_secondaries(&state.objectives) >= SECONDARIES_TO_WIN {
        return Some(EndReason::ObjectivesCompleted);
    }
    if state.invaders.iter().all(InvaderInstance::is_out_of_fight) {
        return Some(EndReason::AllInvadersEliminated);
    }
    if state.current_turn >= state.max_turns {
        return Some(EndReason::TurnLimitReached);
    }
    None
}

/// Outward-facing summary of a finished invasion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedInvasionResult {
    /// Invasion id.
    pub invasion_id: String,
    /// Day it happened.
    pub day: u32,
    /// Victory or defeat for the facility.
    pub outcome: InvasionOutcome,
    /// What ended it.
    pub end_reason: EndReason,
    /// Turns played.
    pub turns: u32,
    /// Party size.
    pub invader_count: u32,
    /// Invaders killed.
    pub invaders_killed: u32,
    /// Invaders who escaped.
    pub invaders_fled: u32,
    /// Defenders at the start.
    pub defender_count: u32,
    /// Defenders killed.
    pub defenders_lost: u32,
    /// Secondaries the invaders completed.
    pub secondaries_completed: u32,
    /// Reward scale.
    #[serde(with = "crate::math::fixed_serde")]
    pub reward_multiplier: Fixed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BaseStats, InvaderClass, InvaderDefinition};
    use crate::facility::RoomId;

    fn invaders(n: u32) -> Vec<InvaderInstance> {
        let def = InvaderDefinition::new("sellsword", InvaderClass::Warrior, "Sellsword", BaseStats::new(30, 6, 6, 4));
        (1..=n)
            .map(|i| InvaderInstance::from_definition(InvaderId(i), &def))
            .collect()
    }

    fn objectives() -> Vec<InvasionObjective> {
        vec![
            InvasionObjective::new("obj-1", ObjectiveKind::DestroyAltar, Some(RoomId(9))),
            InvasionObjective::new("obj-2", ObjectiveKind::LootTreasury, Some(RoomId(4))),
            InvasionObjective::new("obj-3", ObjectiveKind::SlayDefenders, None),
        ]
    }

    fn state() -> InvasionState {
        InvasionState::new("inv-1", 20, invaders(2), objectives(), 3)
    }

    #[test]
    fn test_scenario_altar_clamps_and_completes() {
        let mut s = state();
        for _ in 0..3 {
            s = s.damage_altar(40);
        }
        assert_eq!(s.altar_hp, 0);
        assert_eq!(s.objectives[0].progress, 100);
        assert!(s.objectives[0].is_completed);
    }

    #[test]
    fn test_altar_progress_partial() {
        let s = state().damage_altar(40);
        assert_eq!(s.altar_hp, 60);
        assert_eq!(s.objectives[0].progress, 40);
        assert!(!s.objectives[0].is_completed);
    }

    #[test]
    fn test_untargeted_altar_objective_never_moves() {
        let mut objectives = objectives();
        objectives[0].target = None;
        let s = InvasionState::new("inv-1", 1, invaders(1), objectives, 0).damage_altar(50);
        assert_eq!(s.objectives[0].progress, 0);
    }

    #[test]
    fn test_priority_altar_beats_elimination() {
        let s = state()
            .damage_altar(100)
            .mark_invader_killed(InvaderId(1))
            .mark_invader_killed(InvaderId(2));
        assert_eq!(check_end_condition(&s), Some(EndReason::AltarDestroyed));
    }

    #[test]
    fn test_objectives_completed() {
        let s = state()
            .update_objective("obj-2", 100)
            .update_objective("obj-3", 100);
        assert_eq!(check_end_condition(&s), Some(EndReason::ObjectivesCompleted));
    }

    #[test]
    fn test_objectives_win_is_a_defeat() {
        let result = state()
            .update_objective("obj-2", 100)
            .update_objective("obj-3", 100)
            .end_invasion(EndReason::ObjectivesCompleted)
            .result()
            .unwrap();
        assert!(result.end_reason.invaders_won());
        assert_eq!(result.outcome, InvasionOutcome::Defeat);
        assert_eq!(result.reward_multiplier, Fixed::ZERO);
        assert_eq!(result.secondaries_completed, 2);
    }

    #[test]
    fn test_fled_counts_as_eliminated() {
        let s = state()
            .mark_invader_killed(InvaderId(1))
            .mark_invader_fled(InvaderId(2));
        assert_eq!(check_end_condition(&s), Some(EndReason::AllInvadersEliminated));
        assert_eq!(s.invaders_killed, 1);
        assert_eq!(s.invaders_fled, 1);
    }

    #[test]
    fn test_turn_limit() {
        let mut s = state().with_max_turns(2);
        assert_eq!(check_end_condition(&s), None);
        s = s.advance_invasion_turn().advance_invasion_turn();
        assert_eq!(check_end_condition(&s), Some(EndReason::TurnLimitReached));
    }

    #[test]
    fn test_end_is_monotonic_and_freezes() {
        let ended = state().end_invasion(EndReason::TurnLimitReached);
        assert!(!ended.is_active);
        let again = ended.end_invasion(EndReason::AltarDestroyed).damage_altar(50);
        assert_eq!(again.end_reason, Some(EndReason::TurnLimitReached));
        assert_eq!(again.altar_hp, 100);
        assert!(!again.is_active);
    }

    #[test]
    fn test_double_kill_counts_once() {
        let s = state()
            .mark_invader_killed(InvaderId(1))
            .mark_invader_killed(InvaderId(1));
        assert_eq!(s.invaders_killed, 1);
    }

    #[test]
    fn test_result_summary() {
        let running = state();
        assert!(running.result().is_none());
        let done = running
            .record_defender_loss()
            .mark_invader_killed(InvaderId(1))
            .advance_invasion_turn()
            .end_invasion(EndReason::TurnLimitReached);
        let result = done.result().unwrap();
        assert_eq!(result.outcome, InvasionOutcome::Victory);
        assert_eq!(result.end_reason, EndReason::TurnLimitReached);
        assert_eq!(result.defenders_lost, 1);
        assert_eq!(result.invaders_killed, 1);
        assert_eq!(result.turns, 1);
        assert_eq!(result.reward_multiplier, Fixed::from_num(1.5));
    }
}
