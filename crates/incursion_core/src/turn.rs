//! Turn order and tactical actions.
//!
//! A [`TurnQueue`] is a value: every operation returns a new queue and
//! leaves the old one untouched. Within a round combatants act in speed
//! order (defenders first on ties); dead combatants never act and are
//! dropped when the next round starts.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combat::{resolve_attack, AttackResolution, CombatStats};
use crate::facility::TilePos;
use crate::rng::RollSource;

/// Which side a combatant fights for. Defenders sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Facility-controlled.
    Defender,
    /// Hostile.
    Invader,
}

impl Side {
    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Defender => Self::Invader,
            Self::Invader => Self::Defender,
        }
    }
}

/// Identifies a combatant across both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatantId {
    /// Side.
    pub side: Side,
    /// Invader or defender id.
    pub index: u32,
}

impl CombatantId {
    /// A defender id.
    #[must_use]
    pub const fn defender(index: u32) -> Self {
        Self {
            side: Side::Defender,
            index,
        }
    }

    /// An invader id.
    #[must_use]
    pub const fn invader(index: u32) -> Self {
        Self {
            side: Side::Invader,
            index,
        }
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Side::Defender => write!(f, "defender#{}", self.index),
            Side::Invader => write!(f, "invader#{}", self.index),
        }
    }
}

/// Turn-engine projection of an invader or defender.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combatant {
    /// Identifier.
    pub id: CombatantId,
    /// Initiative.
    pub speed: i32,
    /// Current hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Attack bonus.
    pub attack: i32,
    /// Defense.
    pub defense: i32,
    /// Acted this round.
    pub has_acted: bool,
    /// Board tile.
    pub position: TilePos,
}

impl Combatant {
    /// Create a combatant at full health.
    #[must_use]
    pub const fn new(id: CombatantId, position: TilePos, speed: i32, hp: i32, attack: i32, defense: i32) -> Self {
        Self {
            id,
            speed,
            hp,
            max_hp: hp,
            attack,
            defense,
            has_acted: false,
            position,
        }
    }

    /// Still standing.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Stats for the combat resolver.
    #[must_use]
    pub const fn combat_stats(&self) -> CombatStats {
        CombatStats::new(self.attack, self.defense, self.hp)
    }
}

fn initiative_order(a: &Combatant, b: &Combatant) -> Ordering {
    b.speed
        .cmp(&a.speed)
        .then(a.id.side.cmp(&b.id.side))
        .then(a.id.index.cmp(&b.id.index))
}

/// Speed-ordered queue for one round.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TurnQueue {
    combatants: Vec<Combatant>,
    current_index: usize,
    round: u32,
}

impl TurnQueue {
    /// Build the queue for round one.
    #[must_use]
    pub fn build(mut combatants: Vec<Combatant>) -> Self {
        combatants.sort_by(initiative_order);
        let queue = Self {
            combatants,
            current_index: 0,
            round: 1,
        };
        queue.settled()
    }

    /// Current round, starting at 1.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// All combatants in initiative order, dead ones included until the
    /// round ends.
    #[must_use]
    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    /// Look up a combatant.
    #[must_use]
    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    /// Living combatants of `side`.
    pub fn living(&self, side: Side) -> impl Iterator<Item = &Combatant> {
        self.combatants
            .iter()
            .filter(move |c| c.id.side == side && c.is_alive())
    }

    /// Whether a living combatant stands on `pos`.
    #[must_use]
    pub fn is_occupied(&self, pos: TilePos) -> bool {
        self.combatants
            .iter()
            .any(|c| c.is_alive() && c.position == pos)
    }

    /// The combatant whose turn it is; `None` once the round is complete.
    #[must_use]
    pub fn current_actor(&self) -> Option<&Combatant> {
        self.combatants
            .get(self.current_index)
            .filter(|c| c.is_alive() && !c.has_acted)
    }

    /// Whether every living combatant has acted.
    #[must_use]
    pub fn is_round_complete(&self) -> bool {
        self.current_actor().is_none()
    }

    /// Mark the current actor as done and move to the next eligible one.
    #[must_use]
    pub fn advance_turn(&self) -> Self {
        let mut next = self.clone();
        if let Some(actor) = next.combatants.get_mut(next.current_index) {
            actor.has_acted = true;
        }
        next.settled()
    }

    /// Drop the dead, clear acted flags, re-sort and bump the round.
    #[must_use]
    pub fn start_new_round(&self) -> Self {
        let mut combatants: Vec<Combatant> = self
            .combatants
            .iter()
            .filter(|c| c.is_alive())
            .cloned()
            .map(|mut c| {
                c.has_acted = false;
                c
            })
            .collect();
        combatants.sort_by(initiative_order);
        let next = Self {
            combatants,
            current_index: 0,
            round: self.round + 1,
        };
        next.settled()
    }

    /// Replace the combatant with the same id.
    #[must_use]
    pub fn with_combatant(&self, combatant: Combatant) -> Self {
        let mut next = self.clone();
        if let Some(slot) = next.combatants.iter_mut().find(|c| c.id == combatant.id) {
            *slot = combatant;
        }
        next.settled()
    }

    /// Remove a combatant (an invader that fled, for example).
    #[must_use]
    pub fn without(&self, id: CombatantId) -> Self {
        let mut next = self.clone();
        if let Some(pos) = next.combatants.iter().position(|c| c.id == id) {
            next.combatants.remove(pos);
            if pos < next.current_index {
                next.current_index -= 1;
            }
        }
        next.settled()
    }

    /// Move `current_index` forward past anyone who cannot act.
    fn settled(mut self) -> Self {
        while let Some(c) = self.combatants.get(self.current_index) {
            if c.is_alive() && !c.has_acted {
                break;
            }
            self.current_index += 1;
        }
        self
    }
}

/// Walkable area of the battle board.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Board {
    /// Columns.
    pub width: i32,
    /// Rows.
    pub height: i32,
    /// Impassable tiles.
    pub blocked: BTreeSet<TilePos>,
}

impl Board {
    /// An open board.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            blocked: BTreeSet::new(),
        }
    }

    /// Mark a tile impassable.
    #[must_use]
    pub fn with_blocked(mut self, pos: TilePos) -> Self {
        self.blocked.insert(pos);
        self
    }

    /// In bounds and not blocked.
    #[must_use]
    pub fn is_walkable(&self, pos: TilePos) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.x < self.width
            && pos.y < self.height
            && !self.blocked.contains(&pos)
    }
}

/// What a combatant does on its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Step to a cardinal-adjacent free tile.
    Move(TilePos),
    /// Strike a cardinal-adjacent enemy.
    Attack(CombatantId),
    /// Do nothing.
    Wait,
}

/// What actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    /// Moved.
    Moved {
        /// Previous tile.
        from: TilePos,
        /// New tile.
        to: TilePos,
    },
    /// Attacked.
    Attacked {
        /// Target.
        target: CombatantId,
        /// Resolution.
        resolution: AttackResolution,
    },
    /// Waited, by choice or because the action was not legal.
    Waited,
}

/// Carry out `action` for `actor`. Illegal actions degrade to a wait.
///
/// Does not advance the turn.
pub fn execute_action(
    queue: &TurnQueue,
    actor: CombatantId,
    action: Action,
    board: &Board,
    rng: &mut impl RollSource,
) -> (TurnQueue, ActionOutcome) {
    let Some(me) = queue.get(actor).filter(|c| c.is_alive()) else {
        return (queue.clone(), ActionOutcome::Waited);
    };

    match action {
        Action::Move(to) => {
            let legal = me.position.is_cardinal_adjacent(to)
                && board.is_walkable(to)
                && !queue.is_occupied(to);
            if !legal {
                tracing::debug!(%actor, ?to, "Illegal move, waiting instead");
                return (queue.clone(), ActionOutcome::Waited);
            }
            let from = me.position;
            let mut moved = me.clone();
            moved.position = to;
            (queue.with_combatant(moved), ActionOutcome::Moved { from, to })
        }
        Action::Attack(target) => {
            let Some(victim) = queue.get(target).filter(|t| {
                t.is_alive()
                    && t.id.side != me.id.side
                    && t.position.is_cardinal_adjacent(me.position)
            }) else {
                tracing::debug!(%actor, %target, "Illegal attack, waiting instead");
                return (queue.clone(), ActionOutcome::Waited);
            };
            let resolution = resolve_attack(me.combat_stats(), victim.combat_stats(), rng);
            let mut hurt = victim.clone();
            hurt.hp = resolution.defender_hp;
            tracing::debug!(
                %actor,
                %target,
                roll = resolution.roll,
                damage = resolution.damage,
                "Attack resolved"
            );
            (
                queue.with_combatant(hurt),
                ActionOutcome::Attacked { target, resolution },
            )
        }
        Action::Wait => (queue.clone(), ActionOutcome::Waited),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRolls;

    fn defender(index: u32, speed: i32, pos: TilePos) -> Combatant {
        Combatant::new(CombatantId::defender(index), pos, speed, 20, 8, 5)
    }

    fn invader(index: u32, speed: i32, pos: TilePos) -> Combatant {
        Combatant::new(CombatantId::invader(index), pos, speed, 20, 8, 5)
    }

    #[test]
    fn test_scenario_defender_first_on_tie() {
        let queue = TurnQueue::build(vec![
            invader(1, 5, TilePos::new(0, 0)),
            defender(1, 5, TilePos::new(3, 3)),
        ]);
        assert_eq!(queue.current_actor().unwrap().id.side, Side::Defender);
    }

    #[test]
    fn test_speed_order_and_round_completion() {
        let queue = TurnQueue::build(vec![
            defender(1, 2, TilePos::new(0, 0)),
            invader(1, 9, TilePos::new(1, 0)),
            invader(2, 4, TilePos::new(2, 0)),
        ]);
        let order: Vec<_> = queue.combatants().iter().map(|c| c.id).collect();
        assert_eq!(
            order,
            vec![CombatantId::invader(1), CombatantId::invader(2), CombatantId::defender(1)]
        );
        let queue = queue.advance_turn().advance_turn();
        assert_eq!(queue.current_actor().unwrap().id, CombatantId::defender(1));
        let queue = queue.advance_turn();
        assert!(queue.is_round_complete());
        let next = queue.start_new_round();
        assert_eq!(next.round(), 2);
        assert!(next.combatants().iter().all(|c| !c.has_acted));
    }

    #[test]
    fn test_dead_never_current() {
        let queue = TurnQueue::build(vec![
            invader(1, 9, TilePos::new(0, 0)),
            defender(1, 5, TilePos::new(1, 0)),
        ]);
        let mut dead = queue.combatants()[1].clone();
        dead.hp = 0;
        let queue = queue.with_combatant(dead).advance_turn();
        assert!(queue.current_actor().is_none());
        let next = queue.start_new_round();
        assert_eq!(next.combatants().len(), 1);
    }

    #[test]
    fn test_mutations_do_not_alias() {
        let queue = TurnQueue::build(vec![invader(1, 5, TilePos::new(0, 0))]);
        let advanced = queue.advance_turn();
        assert!(!queue.combatants()[0].has_acted);
        assert!(advanced.combatants()[0].has_acted);
    }

    #[test]
    fn test_move_rules() {
        let board = Board::new(4, 4).with_blocked(TilePos::new(2, 1));
        let queue = TurnQueue::build(vec![
            invader(1, 5, TilePos::new(1, 1)),
            defender(1, 3, TilePos::new(1, 2)),
        ]);
        let mut rolls = ScriptedRolls::d20([10]);
        let me = CombatantId::invader(1);

        let (_, out) = execute_action(&queue, me, Action::Move(TilePos::new(1, 0)), &board, &mut rolls);
        assert!(matches!(out, ActionOutcome::Moved { .. }));
        for bad in [TilePos::new(2, 1), TilePos::new(1, 2), TilePos::new(2, 2), TilePos::new(1, 3)] {
            let (same, out) = execute_action(&queue, me, Action::Move(bad), &board, &mut rolls);
            assert_eq!(out, ActionOutcome::Waited);
            assert_eq!(same, queue);
        }
    }

    #[test]
    fn test_attack_adjacent_enemy() {
        let board = Board::new(4, 4);
        let queue = TurnQueue::build(vec![
            Combatant::new(CombatantId::invader(1), TilePos::new(1, 1), 5, 20, 15, 0),
            Combatant::new(CombatantId::defender(1), TilePos::new(1, 2), 3, 20, 0, 8),
        ]);
        let mut rolls = ScriptedRolls::d20([10]);
        let (after, out) = execute_action(
            &queue,
            CombatantId::invader(1),
            Action::Attack(CombatantId::defender(1)),
            &board,
            &mut rolls,
        );
        let ActionOutcome::Attacked { resolution, .. } = out else {
            panic!("expected attack");
        };
        assert_eq!(resolution.damage, 7);
        assert_eq!(after.get(CombatantId::defender(1)).unwrap().hp, 13);
    }

    #[test]
    fn test_attack_out_of_reach_waits() {
        let board = Board::new(6, 6);
        let queue = TurnQueue::build(vec![
            invader(1, 5, TilePos::new(0, 0)),
            defender(1, 3, TilePos::new(3, 3)),
            invader(2, 4, TilePos::new(0, 1)),
        ]);
        let mut rolls = ScriptedRolls::d20([20]);
        let (_, far) = execute_action(
            &queue,
            CombatantId::invader(1),
            Action::Attack(CombatantId::defender(1)),
            &board,
            &mut rolls,
        );
        assert_eq!(far, ActionOutcome::Waited);
        let (_, friendly) = execute_action(
            &queue,
            CombatantId::invader(1),
            Action::Attack(CombatantId::invader(2)),
            &board,
            &mut rolls,
        );
        assert_eq!(friendly, ActionOutcome::Waited);
    }

    #[test]
    fn test_without_keeps_cursor() {
        let queue = TurnQueue::build(vec![
            invader(1, 9, TilePos::new(0, 0)),
            invader(2, 5, TilePos::new(1, 0)),
            defender(1, 1, TilePos::new(2, 0)),
        ])
        .advance_turn();
        assert_eq!(queue.current_actor().unwrap().id, CombatantId::invader(2));
        let queue = queue.without(CombatantId::invader(1));
        assert_eq!(queue.current_actor().unwrap().id, CombatantId::invader(2));
    }
}
