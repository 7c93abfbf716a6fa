//! Invasion service: the per-tick entry point for the rest of the game.
//!
//! Each [`InvasionService::tick`] runs the scheduler, then one battle round,
//! then the win/loss check and its consequences, all inside a single
//! [`StateChannel`] update. Events produced along the way are published to
//! the [`EventBus`] after the update commits and are also returned.
//!
//! # Example
//!
//! ```
//! use incursion_core::catalog::Catalog;
//! use incursion_core::facility::{FacilityLayout, StockLedger};
//! use incursion_core::scheduler::GameClock;
//! use incursion_core::service::{FacilityState, InvasionService};
//! use incursion_core::tuning::InvasionTuning;
//!
//! let tuning = InvasionTuning::default();
//! let facility = FacilityState::new(FacilityLayout::default(), StockLedger::new(), &tuning);
//! let mut service = InvasionService::new(facility, Catalog::standard(), tuning, "seed");
//!
//! // Still inside the grace period: nothing happens.
//! let events = service.tick(GameClock::start_of(1)).unwrap();
//! assert!(events.is_empty());
//! ```

use serde::{Deserialize, Serialize};

use crate::battle::Battle;
use crate::catalog::Catalog;
use crate::channel::StateChannel;
use crate::composition::{check_composable, generate_invasion_party};
use crate::error::{InvasionError, Result};
use crate::events::{EventBus, InvasionEvent, InvasionListener};
use crate::facility::{DefenderSpec, FacilityLayout, Resource, ResourceLedger, RoomKind, StockLedger};
use crate::objectives::{assign_invasion_objectives, InvasionOutcome, ObjectiveContext};
use crate::outcome::{DetailedInvasionResult, InvasionState};
use crate::prisoners::{self, CapturedPrisoner, PrisonerAction, PrisonerId, PrisonerOutcome};
use crate::profile::DungeonProfile;
use crate::rewards::{calculate_defeat_penalties, calculate_victory_rewards, InvasionRewards};
use crate::rng::InvasionRng;
use crate::scheduler::{
    GameClock, InvasionRecord, InvasionSchedule, InvasionScheduler, ScheduleEvent, SpecialInvasion,
};
use crate::tuning::InvasionTuning;

/// Everything the invasion layer owns about one facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityState {
    /// Rooms, connections and defenders.
    pub layout: FacilityLayout,
    /// Resource stockpiles.
    pub ledger: StockLedger,
    /// Invasion calendar and history.
    pub schedule: InvasionSchedule,
    /// Prisoners held in the cells.
    pub prisoners: Vec<CapturedPrisoner>,
    /// Accumulated reputation.
    pub reputation: i32,
    /// Accumulated experience.
    pub experience: i32,
    /// Invasion in progress.
    pub active: Option<Battle>,
    /// Label of the active invasion when it came from the special queue.
    pub active_special: Option<String>,
    /// Id the next captured prisoner receives.
    pub next_prisoner_id: u32,
    /// Invasions started so far; also numbers invasion ids.
    pub invasions_started: u32,
    /// Prisoner actions taken so far; keys each action's random stream.
    pub prisoner_actions: u32,
}

impl FacilityState {
    /// Fresh facility state with an empty calendar.
    #[must_use]
    pub fn new(layout: FacilityLayout, ledger: StockLedger, tuning: &InvasionTuning) -> Self {
        Self {
            layout,
            ledger,
            schedule: InvasionSchedule::new(tuning),
            prisoners: Vec::new(),
            reputation: 0,
            experience: 0,
            active: None,
            active_special: None,
            next_prisoner_id: 1,
            invasions_started: 0,
            prisoner_actions: 0,
        }
    }

    /// Look up a prisoner.
    #[must_use]
    pub fn prisoner(&self, id: PrisonerId) -> Option<&CapturedPrisoner> {
        self.prisoners.iter().find(|p| p.id == id)
    }

    /// Serialize the snapshot for the save layer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| InvasionError::Snapshot(e.to_string()))
    }

    /// Restore a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid snapshot.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| InvasionError::Snapshot(e.to_string()))
    }
}

/// Static inputs shared by every step of a tick.
struct Rules<'a> {
    catalog: &'a Catalog,
    tuning: &'a InvasionTuning,
    seed: &'a str,
}

/// Drives invasions for one facility.
#[derive(Debug)]
pub struct InvasionService {
    channel: StateChannel<FacilityState>,
    scheduler: InvasionScheduler,
    catalog: Catalog,
    tuning: InvasionTuning,
    seed: String,
    bus: EventBus,
}

impl InvasionService {
    /// Create a service. All randomness derives from `seed`.
    #[must_use]
    pub fn new(facility: FacilityState, catalog: Catalog, tuning: InvasionTuning, seed: impl Into<String>) -> Self {
        let seed = seed.into();
        Self {
            channel: StateChannel::new(facility),
            scheduler: InvasionScheduler::new(format!("{seed}/schedule")),
            catalog,
            tuning,
            seed,
            bus: EventBus::new(),
        }
    }

    /// Current facility snapshot.
    #[must_use]
    pub fn facility(&self) -> &FacilityState {
        self.channel.snapshot()
    }

    /// Content catalog in use.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Tuning in use.
    #[must_use]
    pub const fn tuning(&self) -> &InvasionTuning {
        &self.tuning
    }

    /// Running invasion, if any.
    #[must_use]
    pub fn active_invasion(&self) -> Option<&InvasionState> {
        self.facility().active.as_ref().map(Battle::state)
    }

    /// Register an event listener.
    pub fn subscribe(&mut self, listener: impl InvasionListener + 'static) {
        self.bus.subscribe(listener);
    }

    /// Give up the service, keeping the facility snapshot.
    #[must_use]
    pub fn into_facility(self) -> FacilityState {
        self.channel.into_inner()
    }

    /// Advance to `clock`: schedule, fight one round, resolve.
    ///
    /// The scheduler is not consulted while an invasion is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the update was rejected; nothing is committed.
    pub fn tick(&mut self, clock: GameClock) -> Result<Vec<InvasionEvent>> {
        let rules = Rules {
            catalog: &self.catalog,
            tuning: &self.tuning,
            seed: &self.seed,
        };
        let mut scheduler = self.scheduler.clone();
        let events = self.channel.update(|state| {
            let mut events = Vec::new();
            if state.active.is_none() {
                for event in scheduler.tick(&mut state.schedule, clock, rules.tuning) {
                    match event {
                        ScheduleEvent::Scheduled { .. } => {}
                        ScheduleEvent::Warning { day, minutes_left } => {
                            events.push(InvasionEvent::Warned { day, minutes_left });
                        }
                        ScheduleEvent::Trigger { day, special } => {
                            events.extend(start_invasion(state, day, special, &rules)?);
                        }
                    }
                }
            }
            events.extend(play_active_round(state, &rules));
            Ok(events)
        })?;
        self.scheduler = scheduler;
        self.bus.publish(&events);
        Ok(events)
    }

    /// Start an invasion on `day` regardless of the calendar.
    ///
    /// # Errors
    ///
    /// Returns [`InvasionError::InvasionAlreadyActive`] if one is running.
    pub fn invade_now(&mut self, day: u32) -> Result<Vec<InvasionEvent>> {
        let rules = Rules {
            catalog: &self.catalog,
            tuning: &self.tuning,
            seed: &self.seed,
        };
        let events = self.channel.update(|state| {
            let mut events = start_invasion(state, day, None, &rules)?;
            events.extend(play_active_round(state, &rules));
            Ok(events)
        })?;
        self.bus.publish(&events);
        Ok(events)
    }

    /// Play the running invasion to its end.
    ///
    /// # Errors
    ///
    /// Returns [`InvasionError::NoActiveInvasion`] if nothing is running.
    pub fn resolve_active(&mut self) -> Result<Vec<InvasionEvent>> {
        let rules = Rules {
            catalog: &self.catalog,
            tuning: &self.tuning,
            seed: &self.seed,
        };
        let events = self.channel.update(|state| {
            if state.active.is_none() {
                return Err(InvasionError::NoActiveInvasion);
            }
            let mut events = Vec::new();
            while state.active.is_some() {
                events.extend(play_active_round(state, &rules));
            }
            Ok(events)
        })?;
        self.bus.publish(&events);
        Ok(events)
    }

    /// Queue a special invasion that ignores the grace period.
    pub fn queue_special_invasion(&mut self, trigger_day: u32, label: impl Into<String>) -> Result<()> {
        let special = SpecialInvasion {
            trigger_day,
            label: label.into(),
        };
        self.channel.update(|state| {
            state.schedule.queue_special(special);
            Ok(())
        })
    }

    /// Deal with a prisoner and apply the outcome to the ledger.
    ///
    /// A converted prisoner joins the defenders in the barracks (or the
    /// cells, or the entrance).
    ///
    /// # Errors
    ///
    /// Returns [`InvasionError::PrisonerNotFound`] for an unknown id, and
    /// [`InvasionError::UpdateRejected`] when conversion cannot be paid for.
    pub fn handle_prisoner(&mut self, id: PrisonerId, action: PrisonerAction) -> Result<PrisonerOutcome> {
        let (catalog, tuning, seed) = (&self.catalog, &self.tuning, &self.seed);
        let outcome = self.channel.update(|state| {
            let index = state
                .prisoners
                .iter()
                .position(|p| p.id == id)
                .ok_or(InvasionError::PrisonerNotFound(id))?;
            if action == PrisonerAction::Convert
                && state.ledger.level(Resource::Essence) < tuning.convert_essence_cost
            {
                return Err(InvasionError::UpdateRejected(format!(
                    "converting {id} needs {} essence",
                    tuning.convert_essence_cost
                )));
            }

            state.prisoner_actions += 1;
            let mut rng = InvasionRng::derive(seed, &format!("prisoner-{}", state.prisoner_actions));
            let prisoner = state.prisoners[index].clone();
            let outcome = prisoners::handle_prisoner(&prisoner, action, catalog, tuning, &mut rng);
            state.ledger.apply(&outcome.resources);

            if outcome.consumed {
                state.prisoners.remove(index);
            }
            if outcome.converted {
                let layout = &state.layout;
                let room = layout
                    .first_room_of(RoomKind::Barracks)
                    .or_else(|| layout.first_room_of(RoomKind::Prison))
                    .or_else(|| layout.entrance())
                    .map(|r| r.id);
                if let Some(room) = room {
                    let id = layout.defenders.iter().map(|d| d.id).max().unwrap_or(0) + 1;
                    state.layout.defenders.push(DefenderSpec {
                        id,
                        name: prisoner.name.clone(),
                        room,
                        stats: prisoner.stats,
                    });
                }
            }
            Ok(outcome)
        })?;
        self.bus.publish(&[InvasionEvent::PrisonerHandled {
            outcome: outcome.clone(),
        }]);
        Ok(outcome)
    }
}

fn start_invasion(
    state: &mut FacilityState,
    day: u32,
    special: Option<SpecialInvasion>,
    rules: &Rules<'_>,
) -> Result<Vec<InvasionEvent>> {
    if let Some(active) = &state.active {
        return Err(InvasionError::InvasionAlreadyActive(
            active.state().invasion_id.clone(),
        ));
    }

    let invasion_id = format!("inv-{}", state.invasions_started + 1);
    let seed = format!("{}/{invasion_id}", rules.seed);
    let profile = DungeonProfile::compute(
        &state.layout,
        &state.ledger,
        day,
        state.schedule.defender_victories(),
    );
    let party = generate_invasion_party(
        &profile,
        rules.catalog,
        rules.tuning.profile_threshold,
        &seed,
        &invasion_id,
    );
    if party.is_empty() {
        let reason = check_composable(rules.catalog)
            .err()
            .map_or_else(|| "no party could be assembled".to_string(), |e| e.to_string());
        return Ok(vec![InvasionEvent::Skipped { day, reason }]);
    }

    let context = ObjectiveContext::from_layout(&state.layout, state.prisoners.len() as u32);
    let objectives = assign_invasion_objectives(&context, &seed);
    let invasion = InvasionState::new(
        invasion_id.as_str(),
        day,
        party,
        objectives,
        state.layout.defenders.len() as u32,
    )
    .with_max_turns(rules.tuning.max_turns)
    .with_altar(rules.tuning.altar_max_hp);

    let party_size = invasion.invaders.len();
    state.active = Some(Battle::start(invasion, &state.layout, rules.tuning, &seed));
    state.active_special = special.as_ref().map(|s| s.label.clone());
    state.invasions_started += 1;

    Ok(vec![InvasionEvent::Triggered {
        invasion_id,
        day,
        party_size,
        special: special.map(|s| s.label),
    }])
}

fn play_active_round(state: &mut FacilityState, rules: &Rules<'_>) -> Vec<InvasionEvent> {
    let Some(battle) = state.active.as_mut() else {
        return Vec::new();
    };
    let report = battle.play_round();
    let mut events = vec![InvasionEvent::RoundPlayed {
        invasion_id: battle.state().invasion_id.clone(),
        report,
    }];
    if let Some(result) = battle.result() {
        events.extend(conclude(state, result, rules));
    }
    events
}

/// Apply the consequences of a finished invasion and retire it.
fn conclude(state: &mut FacilityState, result: DetailedInvasionResult, rules: &Rules<'_>) -> Vec<InvasionEvent> {
    let Some(battle) = state.active.take() else {
        return Vec::new();
    };
    let mut rng = InvasionRng::derive(battle.seed(), "aftermath");
    let invasion = battle.into_state();

    let rewards: InvasionRewards = match result.outcome {
        InvasionOutcome::Victory => calculate_victory_rewards(
            &invasion,
            rules.catalog,
            rules.tuning,
            result.reward_multiplier,
            &mut rng,
        ),
        InvasionOutcome::Defeat => calculate_defeat_penalties(&invasion, &state.ledger, rules.tuning),
    };
    state.ledger.apply(&rewards.resources);
    state.reputation += rewards.reputation;
    state.experience += rewards.experience;

    let captured = if result.outcome == InvasionOutcome::Victory {
        prisoners::roll_captures(
            &invasion.invaders,
            rules.catalog,
            rules.tuning,
            invasion.day,
            state.next_prisoner_id,
            &mut rng,
        )
    } else {
        Vec::new()
    };
    state.next_prisoner_id += captured.len() as u32;
    state.prisoners.extend(captured.iter().cloned());

    state.schedule.record(InvasionRecord {
        invasion_id: invasion.invasion_id.clone(),
        day: invasion.day,
        outcome: result.outcome,
        special: state.active_special.take().is_some(),
    });

    tracing::info!(
        invasion_id = %invasion.invasion_id,
        outcome = result.outcome.as_str(),
        reason = %result.end_reason,
        turns = result.turns,
        captured = captured.len(),
        "Invasion concluded"
    );

    let mut events = vec![InvasionEvent::Ended { result, rewards }];
    events.extend(
        captured
            .into_iter()
            .map(|prisoner| InvasionEvent::PrisonerCaptured { prisoner }),
    );
    events
}
