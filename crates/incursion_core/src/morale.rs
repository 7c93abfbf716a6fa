//! Collective will to fight of the invading party.
//!
//! Morale is a single integer in `[0, 100]` that starts full for every
//! invasion. Each change is logged. Once morale bottoms out the party is
//! retreating for the rest of the invasion, whatever happens afterwards.

use serde::{Deserialize, Serialize};

use crate::catalog::InvaderClass;
use crate::facility::RoomKind;
use crate::tuning::InvasionTuning;

/// Morale ceiling and starting value.
pub const MAX_MORALE: i32 = 100;

/// Morale floor.
pub const MIN_MORALE: i32 = 0;

/// What moved morale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoraleEventType {
    /// An invader died.
    AllyDeath,
    /// A trap was sprung.
    Trap,
    /// The party entered a frightening room.
    FearRoom,
    /// The party took a room.
    RoomCapture,
    /// Anything else (scripted effects, tests).
    Other,
}

/// One logged morale change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoraleEvent {
    /// Cause.
    pub event_type: MoraleEventType,
    /// Requested change.
    pub delta: i32,
    /// Turn it happened on.
    pub turn: u32,
    /// Human-readable description.
    pub description: String,
    /// Morale after clamping.
    pub value_after: i32,
}

/// Invasion-scoped morale state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoraleTracker {
    value: i32,
    retreating: bool,
    log: Vec<MoraleEvent>,
}

impl Default for MoraleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MoraleTracker {
    /// Full morale, empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: MAX_MORALE,
            retreating: false,
            log: Vec::new(),
        }
    }

    /// Reset for a new invasion.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current morale.
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.value
    }

    /// Whether the party has broken.
    #[must_use]
    pub const fn is_retreating(&self) -> bool {
        self.retreating
    }

    /// Every change so far, oldest first.
    #[must_use]
    pub fn log(&self) -> &[MoraleEvent] {
        &self.log
    }

    /// Apply a change. Returns `true` if this change broke the party.
    pub fn apply(
        &mut self,
        event_type: MoraleEventType,
        delta: i32,
        turn: u32,
        description: impl Into<String>,
    ) -> bool {
        self.value = (self.value + delta).clamp(MIN_MORALE, MAX_MORALE);
        let description = description.into();
        tracing::debug!(
            ?event_type,
            delta,
            turn,
            morale = self.value,
            "{description}"
        );
        self.log.push(MoraleEvent {
            event_type,
            delta,
            turn,
            description,
            value_after: self.value,
        });

        if self.value <= MIN_MORALE && !self.retreating {
            self.retreating = true;
            tracing::info!(turn, "Invaders break and retreat");
            return true;
        }
        false
    }
}

/// Morale change when an invader of `class` dies.
#[must_use]
pub fn ally_death_delta(class: InvaderClass, tuning: &InvasionTuning) -> i32 {
    if class.is_holy() {
        tuning.holy_ally_death_morale
    } else {
        tuning.ally_death_morale
    }
}

/// Morale change when an invader of `class` springs a trap.
#[must_use]
pub fn trap_delta(class: InvaderClass, tuning: &InvasionTuning) -> i32 {
    if class.is_fear_prone() {
        tuning.fear_prone_trap_morale
    } else {
        tuning.trap_morale
    }
}

/// Morale change on entering a room with `fear_level`.
///
/// Zero below the fear threshold, and zero while a living ally carries
/// courage.
#[must_use]
pub fn fear_room_delta(fear_level: i32, courage_present: bool, tuning: &InvasionTuning) -> i32 {
    if fear_level < tuning.fear_room_threshold || courage_present {
        0
    } else {
        tuning.fear_room_morale
    }
}

/// Morale change on capturing a room of `kind`.
#[must_use]
pub fn room_capture_delta(kind: RoomKind, tuning: &InvasionTuning) -> i32 {
    if kind.is_high_value() {
        tuning.high_value_capture_morale
    } else {
        tuning.room_capture_morale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_starts_full() {
        let tracker = MoraleTracker::new();
        assert_eq!(tracker.value(), 100);
        assert!(!tracker.is_retreating());
        assert!(tracker.log().is_empty());
    }

    #[test]
    fn test_clamps_and_logs() {
        let mut tracker = MoraleTracker::new();
        tracker.apply(MoraleEventType::RoomCapture, 15, 1, "took the library");
        assert_eq!(tracker.value(), 100);
        tracker.apply(MoraleEventType::AllyDeath, -10, 2, "lost a sellsword");
        assert_eq!(tracker.value(), 90);
        assert_eq!(tracker.log().len(), 2);
        assert_eq!(tracker.log()[1].value_after, 90);
        assert_eq!(tracker.log()[1].turn, 2);
    }

    #[test]
    fn test_retreat_is_one_way() {
        let mut tracker = MoraleTracker::new();
        assert!(tracker.apply(MoraleEventType::Other, -150, 3, "rout"));
        assert!(tracker.is_retreating());
        assert_eq!(tracker.value(), 0);
        assert!(!tracker.apply(MoraleEventType::RoomCapture, 15, 4, "rally"));
        assert_eq!(tracker.value(), 15);
        assert!(tracker.is_retreating());
    }

    #[test]
    fn test_reset() {
        let mut tracker = MoraleTracker::new();
        tracker.apply(MoraleEventType::Other, -100, 1, "rout");
        tracker.reset();
        assert_eq!(tracker, MoraleTracker::new());
    }

    #[test]
    fn test_rule_deltas() {
        let tuning = InvasionTuning::default();
        assert_eq!(ally_death_delta(InvaderClass::Warrior, &tuning), -10);
        assert_eq!(ally_death_delta(InvaderClass::Cleric, &tuning), -15);
        assert_eq!(ally_death_delta(InvaderClass::Paladin, &tuning), -15);
        assert_eq!(trap_delta(InvaderClass::Warrior, &tuning), -5);
        assert_eq!(trap_delta(InvaderClass::Rogue, &tuning), -10);
        assert_eq!(fear_room_delta(2, false, &tuning), 0);
        assert_eq!(fear_room_delta(3, false, &tuning), -15);
        assert_eq!(fear_room_delta(5, true, &tuning), 0);
        assert_eq!(room_capture_delta(RoomKind::Corridor, &tuning), 10);
        assert_eq!(room_capture_delta(RoomKind::Treasury, &tuning), 15);
    }

    proptest! {
        #[test]
        fn prop_morale_bounded_and_retreat_sticky(deltas in proptest::collection::vec(-60i32..60, 0..40)) {
            let mut tracker = MoraleTracker::new();
            let mut broke = false;
            for (turn, delta) in deltas.into_iter().enumerate() {
                tracker.apply(MoraleEventType::Other, delta, turn as u32, "delta");
                prop_assert!((0..=100).contains(&tracker.value()));
                if tracker.value() == 0 {
                    broke = true;
                }
                prop_assert_eq!(tracker.is_retreating(), broke);
            }
        }
    }
}
