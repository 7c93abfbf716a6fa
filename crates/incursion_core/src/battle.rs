//! One invasion, played round by round.
//!
//! A [`Battle`] ties the pieces together: the turn queue decides who acts,
//! the AI and the room graph decide what they do, the combat resolver
//! settles attacks, the morale tracker reacts to deaths, traps, fear and
//! captured rooms, and the win/loss check runs after every round.
//!
//! Randomness for round `n` comes from its own stream derived from the
//! battle seed, so a battle restored from a snapshot continues exactly as
//! the original would have.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ai::{decide_action, step_toward};
use crate::combat::{resolve_attack, CombatStats};
use crate::facility::{FacilityLayout, Room, RoomId, RoomKind, TilePos};
use crate::invader::{InvaderId, InvaderInstance, StatusKind};
use crate::morale::{
    ally_death_delta, fear_room_delta, room_capture_delta, trap_delta, MoraleEventType,
    MoraleTracker,
};
use crate::objectives::ObjectiveKind;
use crate::outcome::{check_end_condition, DetailedInvasionResult, EndReason, InvasionState};
use crate::pathfinding::{find_with_objectives, DungeonGraph, PathOptions, Waypoint};
use crate::rng::InvasionRng;
use crate::turn::{execute_action, Action, ActionOutcome, Board, Combatant, CombatantId, Side, TurnQueue};
use crate::tuning::InvasionTuning;

/// Rounds of bleeding a sprung trap inflicts.
pub const TRAP_BLEED_ROUNDS: u32 = 2;

/// What happened during one round.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoundReport {
    /// Round number (equal to the invasion turn).
    pub round: u32,
    /// Invaders killed this round.
    pub invaders_killed: u32,
    /// Defenders killed this round.
    pub defenders_killed: u32,
    /// Invaders who escaped this round.
    pub invaders_fled: u32,
    /// Damage dealt to the altar this round.
    pub altar_damage: i32,
    /// Morale at the end of the round.
    pub morale: i32,
    /// Set if the invasion ended this round.
    pub end_reason: Option<EndReason>,
}

/// A running invasion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    state: InvasionState,
    queue: TurnQueue,
    board: Board,
    layout: FacilityLayout,
    morale: MoraleTracker,
    tuning: InvasionTuning,
    seed: String,
    visited: BTreeSet<RoomId>,
    sprung_traps: BTreeSet<RoomId>,
}

impl Battle {
    /// Place both sides on the board and open round one.
    ///
    /// Defenders stand at their rooms, invaders gather around the entrance.
    /// Invaders that find no free tile never enter and count as fled.
    #[must_use]
    pub fn start(state: InvasionState, layout: &FacilityLayout, tuning: &InvasionTuning, seed: &str) -> Self {
        let entrance = layout.entrance();
        let origin = entrance.map_or_else(TilePos::default, |r| r.position);

        let mut board = Board::new(layout.width, layout.height);
        if let Some(altar) = layout.altar_room.and_then(|id| layout.room(id)) {
            board = board.with_blocked(altar.position);
        }

        let mut taken = BTreeSet::new();
        let mut combatants = Vec::new();
        for defender in &layout.defenders {
            let anchor = layout.room(defender.room).map_or(origin, |r| r.position);
            if let Some(tile) = nearest_free_tile(&board, anchor, &taken) {
                taken.insert(tile);
                let s = defender.stats;
                combatants.push(Combatant::new(
                    CombatantId::defender(defender.id),
                    tile,
                    s.speed,
                    s.hp,
                    s.attack,
                    s.defense,
                ));
            }
        }

        let mut state = state;
        let mut stranded = Vec::new();
        for invader in &mut state.invaders {
            invader.room = entrance.map(|r| r.id);
            match nearest_free_tile(&board, origin, &taken) {
                Some(tile) => {
                    taken.insert(tile);
                    combatants.push(Combatant::new(
                        CombatantId::invader(invader.id.0),
                        tile,
                        invader.speed,
                        invader.current_hp,
                        invader.attack,
                        invader.defense,
                    ));
                }
                None => stranded.push(invader.id),
            }
        }
        for id in stranded {
            tracing::warn!(invasion_id = %state.invasion_id, %id, "No room on the board; invader turns back");
            state = state.mark_invader_fled(id);
        }

        tracing::info!(
            invasion_id = %state.invasion_id,
            invaders = state.invaders.len(),
            defenders = layout.defenders.len(),
            "Battle started"
        );

        Self {
            state,
            queue: TurnQueue::build(combatants),
            board,
            layout: layout.clone(),
            morale: MoraleTracker::new(),
            tuning: tuning.clone(),
            seed: seed.to_string(),
            visited: entrance.map(|r| r.id).into_iter().collect(),
            sprung_traps: BTreeSet::new(),
        }
    }

    /// Invasion state.
    #[must_use]
    pub const fn state(&self) -> &InvasionState {
        &self.state
    }

    /// Party morale.
    #[must_use]
    pub const fn morale(&self) -> &MoraleTracker {
        &self.morale
    }

    /// Turn queue for the current round.
    #[must_use]
    pub const fn queue(&self) -> &TurnQueue {
        &self.queue
    }

    /// Battle board.
    #[must_use]
    pub const fn board(&self) -> &Board {
        &self.board
    }

    /// Seed every random stream of this battle derives from.
    #[must_use]
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Still running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.is_active
    }

    /// Final summary once the battle has ended.
    #[must_use]
    pub fn result(&self) -> Option<DetailedInvasionResult> {
        self.state.result()
    }

    /// Give up the battle, keeping its state.
    #[must_use]
    pub fn into_state(self) -> InvasionState {
        self.state
    }

    /// Play rounds until the invasion ends.
    pub fn run_to_completion(&mut self) -> DetailedInvasionResult {
        loop {
            self.play_round();
            if let Some(result) = self.state.result() {
                return result;
            }
        }
    }

    /// Let every living combatant act once, then check for the end.
    pub fn play_round(&mut self) -> RoundReport {
        let round = self.state.current_turn + 1;
        let mut report = RoundReport {
            round,
            ..RoundReport::default()
        };
        if !self.state.is_active {
            report.round = self.state.current_turn;
            report.morale = self.morale.value();
            report.end_reason = self.state.end_reason;
            return report;
        }

        let mut rng = InvasionRng::derive(&self.seed, &format!("round-{round}"));
        self.tick_effects(&mut report);

        while let Some(actor) = self.queue.current_actor().map(|c| c.id) {
            match actor.side {
                Side::Defender => {
                    let action = decide_action(&self.queue, actor, &self.board);
                    self.perform(actor, action, &mut rng, &mut report);
                }
                Side::Invader => self.invader_turn(actor, &mut rng, &mut report),
            }
            // An actor that died or left has already been skipped.
            if self.queue.current_actor().map(|c| c.id) == Some(actor) {
                self.queue = self.queue.advance_turn();
            }
        }

        self.update_secondaries();
        self.state = self.state.advance_invasion_turn();
        if let Some(reason) = check_end_condition(&self.state) {
            self.state = self.state.end_invasion(reason);
            report.end_reason = Some(reason);
        }
        self.queue = self.queue.start_new_round();
        report.morale = self.morale.value();

        tracing::debug!(
            invasion_id = %self.state.invasion_id,
            round,
            altar_hp = self.state.altar_hp,
            morale = report.morale,
            "Round complete"
        );
        report
    }

    fn tick_effects(&mut self, report: &mut RoundReport) {
        let ids: Vec<InvaderId> = self.state.active_invaders().map(|i| i.id).collect();
        for id in ids {
            let Some(mut invader) = self.state.invader(id).cloned() else {
                continue;
            };
            let before = invader.current_hp;
            if invader.tick_round() == 0 {
                self.state = self.state.with_invader(invader);
                continue;
            }
            let after = invader.current_hp;
            invader.current_hp = before;
            self.state = self.state.with_invader(invader);
            self.damage_invader(id, after, report);
        }
    }

    fn invader_turn(&mut self, actor: CombatantId, rng: &mut InvasionRng, report: &mut RoundReport) {
        let Some(me) = self.queue.get(actor).cloned() else {
            return;
        };

        if self.morale.is_retreating() {
            self.retreat(actor, &me, rng, report);
            return;
        }

        if self.queue.living(Side::Defender).next().is_some() {
            let action = decide_action(&self.queue, actor, &self.board);
            self.perform(actor, action, rng, report);
            return;
        }

        let altar = self
            .layout
            .altar_room
            .and_then(|id| self.layout.room(id))
            .cloned();
        match altar {
            Some(altar) if me.position.is_cardinal_adjacent(altar.position) => {
                let resolution = resolve_attack(
                    me.combat_stats(),
                    CombatStats::new(0, self.tuning.altar_defense, self.state.altar_hp),
                    rng,
                );
                if resolution.hit {
                    self.state = self.state.damage_altar(resolution.damage);
                    report.altar_damage += resolution.damage;
                }
            }
            Some(altar) => {
                let waypoints = self.waypoints();
                self.move_toward_room(actor, &me, altar.id, &waypoints, rng, report);
            }
            None => {
                let waypoints = self.waypoints();
                match waypoints.first() {
                    Some(target) => self.move_toward_room(actor, &me, target.room, &[], rng, report),
                    None => self.perform(actor, Action::Wait, rng, report),
                }
            }
        }
    }

    fn retreat(&mut self, actor: CombatantId, me: &Combatant, rng: &mut InvasionRng, report: &mut RoundReport) {
        let exit = self.layout.entrance().cloned();
        match exit {
            Some(exit) if me.position.manhattan(exit.position) > 1 => {
                self.move_toward_room(actor, me, exit.id, &[], rng, report);
            }
            _ => {
                let id = InvaderId(actor.index);
                self.state = self.state.mark_invader_fled(id);
                self.queue = self.queue.without(actor);
                report.invaders_fled += 1;
                tracing::debug!(invasion_id = %self.state.invasion_id, %id, "Invader fled");
            }
        }
    }

    /// Step toward `goal`, following the room graph while the invader is
    /// somewhere else. With no route the invader heads straight for the
    /// goal tile.
    fn move_toward_room(
        &mut self,
        actor: CombatantId,
        me: &Combatant,
        goal: RoomId,
        waypoints: &[Waypoint],
        rng: &mut InvasionRng,
        report: &mut RoundReport,
    ) {
        let Some(goal_tile) = self.layout.room(goal).map(|r| r.position) else {
            self.perform(actor, Action::Wait, rng, report);
            return;
        };
        let current = self.state.invader(InvaderId(actor.index)).and_then(|i| i.room);

        let target = match current {
            Some(from) if from != goal => {
                let graph = DungeonGraph::from_layout(&self.layout);
                let options = PathOptions {
                    morale: Some(self.morale.value()),
                    fear_cost_multiplier: self.tuning.fear_cost_multiplier,
                    blocked_nodes: BTreeSet::new(),
                };
                let plan = find_with_objectives(&graph, from, goal, waypoints, &options);
                match plan.path.get(1).and_then(|next| self.layout.room(*next)) {
                    Some(next) => next.position,
                    None => {
                        tracing::debug!(%from, %goal, "No route; heading straight for the goal");
                        goal_tile
                    }
                }
            }
            _ => goal_tile,
        };

        let action = step_toward(&self.queue, me.position, target, &self.board).map_or(Action::Wait, Action::Move);
        self.perform(actor, action, rng, report);
    }

    fn perform(&mut self, actor: CombatantId, action: Action, rng: &mut InvasionRng, report: &mut RoundReport) {
        let (queue, outcome) = execute_action(&self.queue, actor, action, &self.board, rng);
        self.queue = queue;
        match outcome {
            ActionOutcome::Attacked { target, resolution } => match target.side {
                Side::Invader => {
                    self.damage_invader(InvaderId(target.index), resolution.defender_hp, report);
                }
                Side::Defender => {
                    if resolution.defender_dead {
                        self.state = self.state.record_defender_loss();
                        report.defenders_killed += 1;
                        tracing::debug!(invasion_id = %self.state.invasion_id, %target, "Defender slain");
                    }
                }
            },
            ActionOutcome::Moved { to, .. } if actor.side == Side::Invader => {
                self.arrive(InvaderId(actor.index), to, report);
            }
            _ => {}
        }
    }

    /// Apply a new hp value to an invader, handling death.
    fn damage_invader(&mut self, id: InvaderId, hp: i32, report: &mut RoundReport) {
        let Some(invader) = self.state.invader(id).filter(|i| i.is_active()).cloned() else {
            return;
        };
        let combatant_id = CombatantId::invader(id.0);
        if let Some(mut combatant) = self.queue.get(combatant_id).cloned() {
            combatant.hp = hp.max(0);
            self.queue = self.queue.with_combatant(combatant);
        }

        if hp > 0 {
            let mut hurt = invader;
            hurt.current_hp = hp;
            self.state = self.state.with_invader(hurt);
            return;
        }

        self.state = self.state.mark_invader_killed(id);
        report.invaders_killed += 1;
        let turn = self.state.current_turn + 1;
        self.morale.apply(
            MoraleEventType::AllyDeath,
            ally_death_delta(invader.class, &self.tuning),
            turn,
            format!("{} the {} fell", invader.id, invader.class),
        );
    }

    fn arrive(&mut self, id: InvaderId, tile: TilePos, report: &mut RoundReport) {
        let Some(room) = self.layout.room_near(tile).cloned() else {
            return;
        };
        let Some(mut invader) = self.state.invader(id).cloned() else {
            return;
        };
        if invader.room == Some(room.id) {
            return;
        }
        invader.room = Some(room.id);
        self.state = self.state.with_invader(invader);
        self.enter_room(id, &room, report);
    }

    fn enter_room(&mut self, id: InvaderId, room: &Room, report: &mut RoundReport) {
        if !self.visited.insert(room.id) {
            return;
        }
        let turn = self.state.current_turn + 1;

        let courage = self.state.active_invaders().any(InvaderInstance::has_courage);
        let fear = fear_room_delta(room.fear_level, courage, &self.tuning);
        if fear != 0 {
            self.morale.apply(
                MoraleEventType::FearRoom,
                fear,
                turn,
                format!("Entered {} (fear {})", room.id, room.fear_level),
            );
        }

        if room.has_trap && self.sprung_traps.insert(room.id) {
            if let Some(mut invader) = self.state.invader(id).cloned() {
                let hp = invader.current_hp - self.tuning.trap_damage;
                invader.add_status(StatusKind::Bleeding, TRAP_BLEED_ROUNDS);
                let class = invader.class;
                self.state = self.state.with_invader(invader);
                self.morale.apply(
                    MoraleEventType::Trap,
                    trap_delta(class, &self.tuning),
                    turn,
                    format!("{id} sprang a trap in {}", room.id),
                );
                self.damage_invader(id, hp, report);
            }
        }

        if room.kind != RoomKind::Entrance {
            self.morale.apply(
                MoraleEventType::RoomCapture,
                room_capture_delta(room.kind, &self.tuning),
                turn,
                format!("Captured {}", room.id),
            );
        }
    }

    /// Secondary objectives the party still pursues, earliest first.
    fn waypoints(&self) -> Vec<Waypoint> {
        self.state
            .objectives
            .iter()
            .filter(|o| !o.is_primary && !o.is_completed)
            .enumerate()
            .filter_map(|(i, o)| {
                o.target.map(|room| Waypoint {
                    room,
                    priority: -(i as i32),
                })
            })
            .collect()
    }

    fn update_secondaries(&mut self) {
        let objectives = self.state.objectives.clone();
        for objective in objectives.iter().filter(|o| !o.is_primary && !o.is_completed) {
            let progress = match objective.kind {
                ObjectiveKind::SlayDefenders => {
                    if self.state.defender_count == 0 {
                        0
                    } else {
                        (self.state.defenders_lost * 100 / self.state.defender_count) as i32
                    }
                }
                ObjectiveKind::ScoutDungeon => {
                    let rooms = self.layout.room_count().max(1);
                    (self.visited.len() * 100 / rooms) as i32
                }
                _ => match objective.target {
                    Some(room) if self.state.active_invaders().any(|i| i.room == Some(room)) => {
                        objective.progress + self.tuning.room_objective_progress
                    }
                    _ => objective.progress,
                },
            };
            if progress != objective.progress {
                self.state = self.state.update_objective(&objective.id, progress);
            }
        }
    }
}

/// Closest walkable, untaken tile to `origin` by breadth-first search.
fn nearest_free_tile(board: &Board, origin: TilePos, taken: &BTreeSet<TilePos>) -> Option<TilePos> {
    let mut seen = BTreeSet::from([origin]);
    let mut frontier = VecDeque::from([origin]);
    while let Some(tile) = frontier.pop_front() {
        if board.is_walkable(tile) && !taken.contains(&tile) {
            return Some(tile);
        }
        for next in tile.cardinal_neighbors() {
            if board.is_walkable(next) && seen.insert(next) {
                frontier.push_back(next);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BaseStats, InvaderClass, InvaderDefinition};
    use crate::facility::{Connection, DefenderSpec};
    use crate::objectives::InvasionObjective;

    fn layout(defenders: Vec<DefenderSpec>) -> FacilityLayout {
        FacilityLayout {
            width: 12,
            height: 5,
            rooms: vec![
                Room::new(RoomId(1), RoomKind::Entrance, TilePos::new(0, 2)),
                Room::new(RoomId(2), RoomKind::Corridor, TilePos::new(4, 2)),
                Room::new(RoomId(3), RoomKind::Treasury, TilePos::new(4, 0)),
                Room::new(RoomId(4), RoomKind::Altar, TilePos::new(9, 2)),
            ],
            connections: vec![
                Connection::new(RoomId(1), RoomId(2), 4),
                Connection::new(RoomId(2), RoomId(3), 2),
                Connection::new(RoomId(2), RoomId(4), 5),
            ],
            altar_room: Some(RoomId(4)),
            entrance_room: Some(RoomId(1)),
            defenders,
        }
    }

    fn party(n: u32, stats: BaseStats) -> Vec<InvaderInstance> {
        let def = InvaderDefinition::new("sellsword", InvaderClass::Warrior, "Sellsword", stats);
        (1..=n)
            .map(|i| InvaderInstance::from_definition(InvaderId(i), &def))
            .collect()
    }

    fn state(invaders: Vec<InvaderInstance>, defenders: u32) -> InvasionState {
        let objectives = vec![
            InvasionObjective::new("obj-1", ObjectiveKind::DestroyAltar, Some(RoomId(4))),
            InvasionObjective::new("obj-2", ObjectiveKind::LootTreasury, Some(RoomId(3))),
        ];
        let tuning = InvasionTuning::default();
        InvasionState::new("inv-1", 20, invaders, objectives, defenders)
            .with_max_turns(tuning.max_turns)
            .with_altar(tuning.altar_max_hp)
    }

    #[test]
    fn test_start_places_everyone() {
        let defenders = vec![DefenderSpec {
            id: 1,
            name: "Gargoyle".to_string(),
            room: RoomId(2),
            stats: BaseStats::new(30, 8, 6, 5),
        }];
        let battle = Battle::start(
            state(party(3, BaseStats::new(20, 6, 4, 4)), 1),
            &layout(defenders),
            &InvasionTuning::default(),
            "s1",
        );
        assert_eq!(battle.queue().combatants().len(), 4);
        let defender = battle.queue().get(CombatantId::defender(1)).unwrap();
        assert_eq!(defender.position, TilePos::new(4, 2));
        assert!(battle
            .state()
            .invaders
            .iter()
            .all(|i| i.room == Some(RoomId(1))));
        assert!(!battle.board().is_walkable(TilePos::new(9, 2)));
    }

    #[test]
    fn test_undefended_altar_falls() {
        let tuning = InvasionTuning::default();
        let mut battle = Battle::start(
            state(party(4, BaseStats::new(30, 12, 4, 4)), 0),
            &layout(Vec::new()),
            &tuning,
            "s1",
        );
        let result = battle.run_to_completion();
        assert!(!battle.is_active());
        assert_eq!(result.end_reason, EndReason::AltarDestroyed);
        assert_eq!(result.reward_multiplier, crate::math::Fixed::ZERO);
        assert!(result.turns <= tuning.max_turns);
    }

    #[test]
    fn test_strong_defender_repels_weak_party() {
        let defenders = vec![DefenderSpec {
            id: 1,
            name: "Golem".to_string(),
            room: RoomId(2),
            stats: BaseStats::new(500, 40, 30, 9),
        }];
        let mut battle = Battle::start(
            state(party(3, BaseStats::new(6, 1, 1, 2)), 1),
            &layout(defenders),
            &InvasionTuning::default(),
            "s2",
        );
        let result = battle.run_to_completion();
        assert!(matches!(
            result.end_reason,
            EndReason::AllInvadersEliminated | EndReason::TurnLimitReached
        ));
        assert_eq!(result.defenders_lost, 0);
        assert!(battle.state().altar_hp > 0);
    }

    #[test]
    fn test_same_seed_same_battle() {
        let run = |seed: &str| {
            let defenders = vec![DefenderSpec {
                id: 1,
                name: "Imp".to_string(),
                room: RoomId(2),
                stats: BaseStats::new(25, 7, 5, 6),
            }];
            let mut battle = Battle::start(
                state(party(4, BaseStats::new(20, 6, 4, 4)), 1),
                &layout(defenders),
                &InvasionTuning::default(),
                seed,
            );
            battle.run_to_completion();
            battle
        };
        assert_eq!(run("x"), run("x"));
    }

    #[test]
    fn test_rounds_after_end_are_inert() {
        let mut battle = Battle::start(
            state(party(4, BaseStats::new(30, 12, 4, 4)), 0),
            &layout(Vec::new()),
            &InvasionTuning::default(),
            "s1",
        );
        battle.run_to_completion();
        let frozen = battle.state().clone();
        let report = battle.play_round();
        assert_eq!(battle.state(), &frozen);
        assert_eq!(report.end_reason, frozen.end_reason);
    }

    #[test]
    fn test_trap_and_fear_feed_morale() {
        let mut plan = layout(Vec::new());
        plan.rooms[1] = Room::new(RoomId(2), RoomKind::Corridor, TilePos::new(4, 2))
            .with_fear(4)
            .with_trap();
        let mut battle = Battle::start(
            state(party(2, BaseStats::new(30, 6, 4, 4)), 0),
            &plan,
            &InvasionTuning::default(),
            "s1",
        );
        for _ in 0..6 {
            battle.play_round();
        }
        let kinds: Vec<MoraleEventType> = battle.morale().log().iter().map(|e| e.event_type).collect();
        assert!(kinds.contains(&MoraleEventType::FearRoom));
        assert!(kinds.contains(&MoraleEventType::Trap));
        assert!(kinds.contains(&MoraleEventType::RoomCapture));
    }

    #[test]
    fn test_broken_party_flees() {
        let mut battle = Battle::start(
            state(party(2, BaseStats::new(30, 1, 4, 4)), 0),
            &layout(Vec::new()),
            &InvasionTuning::default(),
            "s1",
        );
        battle.morale.apply(MoraleEventType::Other, -100, 0, "rout");
        let result = battle.run_to_completion();
        assert_eq!(result.end_reason, EndReason::AllInvadersEliminated);
        assert_eq!(result.invaders_fled, 2);
        assert_eq!(result.invaders_killed, 0);
    }
}
