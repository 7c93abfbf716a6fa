//! End-to-end invasion tests for incursion_core.
//!
//! These drive the public service and battle APIs the way the rest of the
//! game does: tick by tick, reading events back out.

use std::cell::RefCell;
use std::rc::Rc;

use incursion_core::prelude::*;
use incursion_test_utils::determinism::{clock_at, find_first_divergence, run_service};
use incursion_test_utils::fixtures::{sample_ledger, sample_service, undefended_layout};

/// Service with a recording listener attached.
fn recorded(service: InvasionService) -> (InvasionService, Rc<RefCell<Vec<InvasionEvent>>>) {
    let mut service = service;
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    service.subscribe(move |e: &InvasionEvent| sink.borrow_mut().push(e.clone()));
    (service, log)
}

// =============================================================================
// Scheduling
// =============================================================================

mod schedule {
    use super::*;

    #[test]
    fn test_quiet_grace_period() {
        let mut service = sample_service("grace");
        let grace_end = service.facility().schedule.grace_period_end;
        run_service(&mut service, 0, u64::from(grace_end) * 24);
        assert_eq!(service.facility().invasions_started, 0);
        assert!(service.facility().schedule.invasion_history.is_empty());
    }

    #[test]
    fn test_invasions_are_spaced_and_announced() {
        let (mut service, log) = recorded(sample_service("calendar"));
        run_service(&mut service, 0, 90 * 24);

        let history = &service.facility().schedule.invasion_history;
        assert!(!history.is_empty(), "expected invasions within 90 days");
        assert!(history.iter().all(|r| r.day >= 14));
        for pair in history.windows(2) {
            assert!(pair[1].day >= pair[0].day + 3, "{pair:?}");
        }

        let log = log.borrow();
        for (i, event) in log.iter().enumerate() {
            if let InvasionEvent::Triggered { day, special: None, .. } = event {
                let warned = log[..i]
                    .iter()
                    .any(|e| matches!(e, InvasionEvent::Warned { day: d, .. } if d == day));
                assert!(warned, "invasion on day {day} was never announced");
            }
        }
    }

    #[test]
    fn test_special_invasion_during_grace() {
        let (mut service, log) = recorded(sample_service("special"));
        service.queue_special_invasion(5, "Inquisition").unwrap();
        run_service(&mut service, 0, 8 * 24);

        let history = &service.facility().schedule.invasion_history;
        assert_eq!(history.len(), 1);
        assert!(history[0].special);
        assert_eq!(history[0].day, 5);
        assert!(log
            .borrow()
            .iter()
            .any(|e| matches!(e, InvasionEvent::Ended { .. })));
    }
}

// =============================================================================
// Battles
// =============================================================================

mod battles {
    use super::*;
    use incursion_test_utils::determinism::strategies::{
        arb_chain_layout, arb_classes, arb_seed, arb_stats,
    };
    use incursion_test_utils::fixtures::{party, sample_invasion, sample_layout};
    use incursion_test_utils::proptest::prelude::*;

    #[test]
    fn test_undefended_dungeon_falls_and_pays() {
        let tuning = InvasionTuning {
            altar_max_hp: 30,
            ..InvasionTuning::default()
        };
        let facility = FacilityState::new(undefended_layout(), sample_ledger(), &tuning);
        let gold = facility.ledger.level(Resource::Gold);
        let mut service = InvasionService::new(facility, Catalog::standard(), tuning, "raid");

        let mut events = service.invade_now(20).unwrap();
        events.extend(service.resolve_active().unwrap());

        let ended = events.iter().find_map(|e| match e {
            InvasionEvent::Ended { result, rewards } => Some((result.clone(), rewards.clone())),
            _ => None,
        });
        let (result, rewards) = ended.expect("invasion should end");
        assert_eq!(result.end_reason, EndReason::AltarDestroyed);
        assert_eq!(result.outcome, InvasionOutcome::Defeat);
        assert_eq!(result.reward_multiplier, Fixed::ZERO);
        assert_eq!(rewards.reputation, -10);

        let facility = service.facility();
        assert_eq!(facility.ledger.level(Resource::Gold), gold - gold / 5);
        assert_eq!(facility.reputation, -10);
        assert!(facility.prisoners.is_empty());
        assert!(facility.active.is_none());
    }

    #[test]
    fn test_battle_on_sample_dungeon_terminates() {
        let invasion = sample_invasion(
            party(&[
                InvaderClass::Warrior,
                InvaderClass::Paladin,
                InvaderClass::Mage,
                InvaderClass::Ranger,
            ]),
            "sample",
        );
        let tuning = InvasionTuning::default();
        let mut battle = Battle::start(invasion, &sample_layout(), &tuning, "sample");
        let result = battle.run_to_completion();

        assert!(!battle.is_active());
        assert!(result.turns <= tuning.max_turns);
        assert!(result.invaders_killed + result.invaders_fled <= result.invader_count);
        assert!(result.defenders_lost <= result.defender_count);
        assert_eq!(result.outcome == InvasionOutcome::Defeat, result.end_reason.invaders_won());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_battles_always_end(layout in arb_chain_layout(4), seed in arb_seed()) {
            let tuning = InvasionTuning::default();
            let invasion = InvasionState::new(
                "inv-prop",
                20,
                party(&[InvaderClass::Warrior, InvaderClass::Rogue, InvaderClass::Scholar]),
                Vec::new(),
                0,
            )
            .with_max_turns(tuning.max_turns)
            .with_altar(tuning.altar_max_hp);

            let mut battle = Battle::start(invasion, &layout, &tuning, &seed);
            let result = battle.run_to_completion();
            let state = battle.state();

            prop_assert!(result.turns <= tuning.max_turns);
            prop_assert!(state.altar_hp >= 0 && state.altar_hp <= state.altar_max_hp);
            prop_assert!(state.invaders.iter().all(|i| i.current_hp >= 0));
            prop_assert!(battle.morale().value() >= 0 && battle.morale().value() <= 100);
        }

        #[test]
        fn prop_guarded_battles_end(stats in arb_stats(), classes in arb_classes(6), seed in arb_seed()) {
            let tuning = InvasionTuning::default();
            let mut layout = undefended_layout();
            layout.defenders.push(DefenderSpec {
                id: 1,
                name: "Guard".to_string(),
                room: RoomId(2),
                stats,
            });
            let invasion = InvasionState::new("inv-guard", 20, party(&classes), Vec::new(), 1)
                .with_max_turns(tuning.max_turns)
                .with_altar(tuning.altar_max_hp);

            let mut battle = Battle::start(invasion, &layout, &tuning, &seed);
            let result = battle.run_to_completion();

            prop_assert_eq!(result.invader_count as usize, classes.len());
            prop_assert!(result.turns <= tuning.max_turns);
            prop_assert!(result.defenders_lost <= 1);
            prop_assert_eq!(result.outcome == InvasionOutcome::Defeat, result.end_reason.invaders_won());
        }
    }
}

// =============================================================================
// Prisoners and rewards
// =============================================================================

mod aftermath {
    use super::*;

    #[test]
    fn test_captures_follow_defender_victories() {
        let (mut service, log) = recorded(sample_service("cells"));
        run_service(&mut service, 0, 120 * 24);

        let log = log.borrow();
        let mut last_outcome = None;
        for event in log.iter() {
            match event {
                InvasionEvent::Ended { result, .. } => last_outcome = Some(result.outcome),
                InvasionEvent::PrisonerCaptured { prisoner } => {
                    assert_eq!(last_outcome, Some(InvasionOutcome::Victory));
                    assert!(service.facility().prisoner(prisoner.id).is_some());
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_prisoner_actions_through_service() {
        let tuning = InvasionTuning::default();
        let mut facility = FacilityState::new(undefended_layout(), sample_ledger(), &tuning);
        facility.prisoners.push(CapturedPrisoner {
            id: PrisonerId(1),
            invader_class: InvaderClass::Scholar,
            name: "Ilse the Archivist".to_string(),
            stats: BaseStats::new(16, 4, 3, 5),
            capture_day: 18,
        });
        let research = facility.ledger.level(Resource::Research);
        let (mut service, log) = recorded(InvasionService::new(facility, Catalog::standard(), tuning, "cells"));

        let outcome = service
            .handle_prisoner(PrisonerId(1), PrisonerAction::Experiment)
            .unwrap();
        assert!(outcome.consumed);
        assert_eq!(
            service.facility().ledger.level(Resource::Research),
            research + 15
        );
        assert!(matches!(
            log.borrow().as_slice(),
            [InvasionEvent::PrisonerHandled { .. }]
        ));
        assert!(matches!(
            service.handle_prisoner(PrisonerId(1), PrisonerAction::Execute),
            Err(InvasionError::PrisonerNotFound(PrisonerId(1)))
        ));
    }
}

// =============================================================================
// Determinism
// =============================================================================

mod determinism {
    use super::*;

    #[test]
    fn test_services_never_diverge() {
        assert_eq!(find_first_divergence(|| sample_service("lockstep"), 60 * 24), None);
    }

    #[test]
    fn test_restored_snapshot_continues_identically() {
        let mut original = sample_service("resume");
        let cut = 31 * 24;
        run_service(&mut original, 0, cut);

        let bytes = original.facility().serialize().unwrap();
        let restored = FacilityState::deserialize(&bytes).unwrap();
        let mut resumed = InvasionService::new(
            restored,
            Catalog::standard(),
            InvasionTuning::default(),
            "resume",
        );

        // Resuming at the start of a day: the fresh scheduler has no
        // per-day bookkeeping to lose.
        assert_eq!(clock_at(cut, 24).minute, 0);
        run_service(&mut original, cut, 60 * 24);
        run_service(&mut resumed, cut, 60 * 24);
        assert_eq!(original.facility(), resumed.facility());
    }
}
