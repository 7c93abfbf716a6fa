//! Greedy scripted decisions for both sides.
//!
//! No lookahead. Given the same board and queue the same action comes out.

use crate::facility::TilePos;
use crate::turn::{Action, Board, Combatant, CombatantId, TurnQueue};

/// Choose an action for `actor`.
///
/// 1. Attack the adjacent enemy with the lowest hp (lowest id on ties).
/// 2. Otherwise step toward the nearest enemy by Manhattan distance.
/// 3. Otherwise wait.
#[must_use]
pub fn decide_action(queue: &TurnQueue, actor: CombatantId, board: &Board) -> Action {
    let Some(me) = queue.get(actor).filter(|c| c.is_alive()) else {
        return Action::Wait;
    };
    let enemies: Vec<&Combatant> = queue.living(me.id.side.opponent()).collect();

    if let Some(target) = enemies
        .iter()
        .filter(|e| e.position.is_cardinal_adjacent(me.position))
        .min_by_key(|e| (e.hp, e.id.index))
    {
        return Action::Attack(target.id);
    }

    let nearest = enemies
        .iter()
        .min_by_key(|e| (e.position.manhattan(me.position), e.id.index));
    match nearest.and_then(|enemy| step_toward(queue, me.position, enemy.position, board)) {
        Some(step) => Action::Move(step),
        None => Action::Wait,
    }
}

/// The free neighbour of `from` that gets closest to `goal`, if any of
/// them is strictly closer than `from` itself.
///
/// Neighbours are tried north, east, south, west; the first best wins.
#[must_use]
pub fn step_toward(queue: &TurnQueue, from: TilePos, goal: TilePos, board: &Board) -> Option<TilePos> {
    let current = from.manhattan(goal);
    let mut best: Option<(i32, TilePos)> = None;
    for next in from.cardinal_neighbors() {
        if !board.is_walkable(next) || queue.is_occupied(next) {
            continue;
        }
        let distance = next.manhattan(goal);
        if distance >= current {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, next));
        }
    }
    best.map(|(_, tile)| tile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::Combatant;

    fn combatant(id: CombatantId, x: i32, y: i32, hp: i32) -> Combatant {
        Combatant::new(id, TilePos::new(x, y), 5, hp, 6, 4)
    }

    #[test]
    fn test_attacks_weakest_adjacent() {
        let queue = TurnQueue::build(vec![
            combatant(CombatantId::defender(1), 2, 2, 30),
            combatant(CombatantId::invader(1), 2, 1, 12),
            combatant(CombatantId::invader(2), 3, 2, 5),
            combatant(CombatantId::invader(3), 4, 4, 1),
        ]);
        let action = decide_action(&queue, CombatantId::defender(1), &Board::new(8, 8));
        assert_eq!(action, Action::Attack(CombatantId::invader(2)));
    }

    #[test]
    fn test_steps_toward_nearest() {
        let queue = TurnQueue::build(vec![
            combatant(CombatantId::invader(1), 0, 0, 10),
            combatant(CombatantId::defender(1), 0, 4, 10),
            combatant(CombatantId::defender(2), 6, 6, 10),
        ]);
        let action = decide_action(&queue, CombatantId::invader(1), &Board::new(8, 8));
        assert_eq!(action, Action::Move(TilePos::new(0, 1)));
    }

    #[test]
    fn test_routes_around_blocked_tile() {
        let queue = TurnQueue::build(vec![
            combatant(CombatantId::invader(1), 0, 0, 10),
            combatant(CombatantId::defender(1), 3, 0, 10),
        ]);
        let board = Board::new(5, 5).with_blocked(TilePos::new(1, 0));
        // East is blocked and south does not get closer.
        assert_eq!(decide_action(&queue, CombatantId::invader(1), &board), Action::Wait);
        let open = decide_action(&queue, CombatantId::invader(1), &Board::new(5, 5));
        assert_eq!(open, Action::Move(TilePos::new(1, 0)));
    }

    #[test]
    fn test_no_enemies_waits() {
        let queue = TurnQueue::build(vec![combatant(CombatantId::invader(1), 0, 0, 10)]);
        assert_eq!(
            decide_action(&queue, CombatantId::invader(1), &Board::new(3, 3)),
            Action::Wait
        );
    }
}
