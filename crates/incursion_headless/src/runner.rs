//! Drives one service through a scenario, minute by minute.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tracing::{debug, info};

use incursion_core::catalog::Catalog;
use incursion_core::error::InvasionError;
use incursion_core::events::InvasionEvent;
use incursion_core::prisoners::PrisonerAction;
use incursion_core::scheduler::GameClock;
use incursion_core::service::{FacilityState, InvasionService};

use crate::metrics::{MetricsCollector, RunMetrics};
use crate::scenario::{Scenario, ScenarioError};

/// Hash of a facility's bincode snapshot.
pub fn state_hash(facility: &FacilityState) -> Result<u64, ScenarioError> {
    let bytes = facility.serialize()?;
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    Ok(hasher.finish())
}

/// Simulate `scenario.days` days for one seed.
pub fn run_scenario(scenario: &Scenario, catalog: &Catalog, seed: &str) -> Result<RunMetrics, ScenarioError> {
    run_scenario_with(scenario, catalog, seed, |_| {})
}

/// Like [`run_scenario`], handing every event to `on_event` as it happens.
pub fn run_scenario_with(
    scenario: &Scenario,
    catalog: &Catalog,
    seed: &str,
    mut on_event: impl FnMut(&InvasionEvent),
) -> Result<RunMetrics, ScenarioError> {
    let mut service = scenario.build_service(catalog.clone(), seed)?;
    let mut collector = MetricsCollector::new(&scenario.name, seed, scenario.days);
    let minutes = scenario.tuning.minutes_per_day.max(1);

    info!(scenario = %scenario.name, seed, days = scenario.days, "Starting run");
    for day in 0..scenario.days {
        for minute in 0..minutes {
            let events = service.tick(GameClock::new(day, minute))?;
            record(&mut collector, &mut on_event, &events);
            let handled = apply_prisoner_policy(&mut service, scenario.prisoner_policy, &events)?;
            record(&mut collector, &mut on_event, &handled);
        }
    }

    finish(&service, collector)
}

/// Start one invasion on `day` and play it to the end.
///
/// An invasion that finds no party ends the run with only a `Skipped` event.
pub fn invade_once(
    scenario: &Scenario,
    catalog: &Catalog,
    seed: &str,
    day: u32,
    mut on_event: impl FnMut(&InvasionEvent),
) -> Result<RunMetrics, ScenarioError> {
    let mut service = scenario.build_service(catalog.clone(), seed)?;
    let mut collector = MetricsCollector::new(&scenario.name, seed, 1);

    let mut events = service.invade_now(day)?;
    if service.active_invasion().is_some() {
        events.extend(service.resolve_active()?);
    }
    record(&mut collector, &mut on_event, &events);
    let handled = apply_prisoner_policy(&mut service, scenario.prisoner_policy, &events)?;
    record(&mut collector, &mut on_event, &handled);

    finish(&service, collector)
}

fn record(collector: &mut MetricsCollector, on_event: &mut impl FnMut(&InvasionEvent), events: &[InvasionEvent]) {
    for event in events {
        collector.observe(event);
        on_event(event);
    }
}

/// Handle every prisoner captured in `events` with `policy`.
///
/// A conversion the ledger cannot pay for leaves the prisoner in the cells.
fn apply_prisoner_policy(
    service: &mut InvasionService,
    policy: Option<PrisonerAction>,
    events: &[InvasionEvent],
) -> Result<Vec<InvasionEvent>, ScenarioError> {
    let Some(action) = policy else {
        return Ok(Vec::new());
    };
    let mut handled = Vec::new();
    for event in events {
        let InvasionEvent::PrisonerCaptured { prisoner } = event else {
            continue;
        };
        match service.handle_prisoner(prisoner.id, action) {
            Ok(outcome) => handled.push(InvasionEvent::PrisonerHandled { outcome }),
            Err(InvasionError::UpdateRejected(reason)) => {
                debug!(prisoner = %prisoner.id, %reason, "Prisoner policy skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(handled)
}

fn finish(service: &InvasionService, collector: MetricsCollector) -> Result<RunMetrics, ScenarioError> {
    let facility = service.facility();
    let hash = state_hash(facility)?;
    let metrics = collector.finalize(facility.reputation, facility.experience, hash);
    info!(
        invasions = metrics.invasions.len(),
        defender_wins = metrics.defender_wins(),
        reputation = metrics.final_reputation,
        "Run complete"
    );
    Ok(metrics)
}
