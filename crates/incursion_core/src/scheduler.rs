//! When invasions happen.
//!
//! The schedule itself ([`InvasionSchedule`]) is plain data persisted with
//! the facility. The [`InvasionScheduler`] holds the per-process bookkeeping
//! (which day was last processed) and must be [`reset`] between sessions.
//!
//! [`reset`]: InvasionScheduler::reset

use serde::{Deserialize, Serialize};

use crate::objectives::InvasionOutcome;
use crate::rng::{InvasionRng, RollSource};
use crate::tuning::InvasionTuning;

/// Day and minute of game time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GameClock {
    /// Day counter.
    pub day: u32,
    /// Minute within the day.
    pub minute: u32,
}

impl GameClock {
    /// Create a clock reading.
    #[must_use]
    pub const fn new(day: u32, minute: u32) -> Self {
        Self { day, minute }
    }

    /// Start of a day.
    #[must_use]
    pub const fn start_of(day: u32) -> Self {
        Self { day, minute: 0 }
    }
}

/// A finished invasion in the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvasionRecord {
    /// Invasion id.
    pub invasion_id: String,
    /// Day it began.
    pub day: u32,
    /// How it ended for the facility.
    pub outcome: InvasionOutcome,
    /// Triggered from the special queue.
    pub special: bool,
}

/// An invasion forced onto a specific day, bypassing the interval rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialInvasion {
    /// Day it fires (or the first tick after).
    pub trigger_day: u32,
    /// Free-form label carried into events.
    pub label: String,
}

/// Process-wide invasion schedule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvasionSchedule {
    /// Day of the next regular invasion, once scheduled.
    pub next_invasion_day: Option<u32>,
    /// Variance applied to the last scheduled interval.
    pub variance: i32,
    /// First day an invasion may be scheduled.
    pub grace_period_end: u32,
    /// Day the last invasion began.
    pub last_invasion_day: Option<u32>,
    /// Finished invasions, oldest first.
    pub invasion_history: Vec<InvasionRecord>,
    /// Forced invasions not yet fired, ordered by trigger day.
    pub pending_special_invasions: Vec<SpecialInvasion>,
    /// Warning already issued for `next_invasion_day`.
    pub warning_issued: bool,
}

impl InvasionSchedule {
    /// A fresh schedule with the grace period from `tuning`.
    #[must_use]
    pub fn new(tuning: &InvasionTuning) -> Self {
        Self {
            grace_period_end: tuning.grace_period_days,
            ..Self::default()
        }
    }

    /// Queue a special invasion. Keeps the queue ordered by trigger day;
    /// equal days fire in insertion order.
    pub fn queue_special(&mut self, special: SpecialInvasion) {
        let at = self
            .pending_special_invasions
            .partition_point(|s| s.trigger_day <= special.trigger_day);
        self.pending_special_invasions.insert(at, special);
    }

    /// Append a finished invasion to the history.
    pub fn record(&mut self, record: InvasionRecord) {
        self.invasion_history.push(record);
    }

    /// Invasions the facility repelled.
    #[must_use]
    pub fn defender_victories(&self) -> u32 {
        self.invasion_history
            .iter()
            .filter(|r| r.outcome == InvasionOutcome::Victory)
            .count() as u32
    }
}

/// What a scheduler tick decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// A regular invasion was placed on the calendar.
    Scheduled {
        /// Scheduled day.
        day: u32,
    },
    /// The scheduled invasion is minutes away.
    Warning {
        /// Scheduled day.
        day: u32,
        /// Minutes until it begins.
        minutes_left: u32,
    },
    /// An invasion starts now.
    Trigger {
        /// Current day.
        day: u32,
        /// Set when fired from the special queue.
        special: Option<SpecialInvasion>,
    },
}

/// Per-tick driver for an [`InvasionSchedule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvasionScheduler {
    seed: String,
    last_processed_day: Option<u32>,
}

impl InvasionScheduler {
    /// Create a scheduler whose variance rolls derive from `seed`.
    #[must_use]
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            last_processed_day: None,
        }
    }

    /// Forget per-session bookkeeping.
    pub fn reset(&mut self) {
        self.last_processed_day = None;
    }

    /// Last day whose day-level work ran.
    #[must_use]
    pub const fn last_processed_day(&self) -> Option<u32> {
        self.last_processed_day
    }

    /// Advance the schedule to `clock`.
    ///
    /// Day-level work (special queue, scheduling, triggering) runs once per
    /// day; the warning check runs every tick.
    pub fn tick(
        &mut self,
        schedule: &mut InvasionSchedule,
        clock: GameClock,
        tuning: &InvasionTuning,
    ) -> Vec<ScheduleEvent> {
        let mut events = Vec::new();
        let new_day = self.last_processed_day != Some(clock.day);

        if new_day {
            self.last_processed_day = Some(clock.day);

            if schedule
                .pending_special_invasions
                .first()
                .is_some_and(|s| s.trigger_day <= clock.day)
            {
                let special = schedule.pending_special_invasions.remove(0);
                tracing::info!(day = clock.day, label = %special.label, "Special invasion triggered");
                schedule.last_invasion_day = Some(clock.day);
                if let Some(next) = schedule.next_invasion_day {
                    let pushed = next.max(clock.day + tuning.min_days_between_invasions);
                    if pushed != next {
                        // The moved invasion gets its own warning.
                        schedule.next_invasion_day = Some(pushed);
                        schedule.warning_issued = false;
                    }
                }
                events.push(ScheduleEvent::Trigger {
                    day: clock.day,
                    special: Some(special),
                });
                return events;
            }
        }

        if clock.day < schedule.grace_period_end {
            return events;
        }

        if new_day {
            match schedule.next_invasion_day {
                Some(day) if clock.day >= day => {
                    schedule.next_invasion_day = None;
                    schedule.warning_issued = false;
                    schedule.last_invasion_day = Some(clock.day);
                    tracing::info!(day = clock.day, "Invasion triggered");
                    events.push(ScheduleEvent::Trigger {
                        day: clock.day,
                        special: None,
                    });
                    return events;
                }
                Some(_) => {}
                None => {
                    let day = self.schedule_next(schedule, clock.day, tuning);
                    events.push(ScheduleEvent::Scheduled { day });
                }
            }
        }

        if let Some(minutes_left) = Self::minutes_until_next(schedule, clock, tuning) {
            if !schedule.warning_issued && minutes_left <= tuning.warning_lead_minutes {
                schedule.warning_issued = true;
                tracing::info!(day = clock.day, minutes_left, "Invasion imminent");
                events.push(ScheduleEvent::Warning {
                    day: schedule.next_invasion_day.unwrap_or(clock.day),
                    minutes_left,
                });
            }
        }
        events
    }

    fn schedule_next(&self, schedule: &mut InvasionSchedule, today: u32, tuning: &InvasionTuning) -> u32 {
        let mut rng = InvasionRng::derive(&self.seed, &format!("schedule-{today}"));
        let variance = rng.range_inclusive(-tuning.interval_variance, tuning.interval_variance);
        let interval = InvasionTuning::base_interval(today);

        let mut next = (i64::from(today) + i64::from(interval) + i64::from(variance)).max(0) as u32;
        next = next.max(schedule.grace_period_end).max(today + 1);
        if let Some(last) = schedule.last_invasion_day {
            next = next.max(last + tuning.min_days_between_invasions);
        }

        schedule.next_invasion_day = Some(next);
        schedule.variance = variance;
        schedule.warning_issued = false;
        tracing::debug!(today, interval, variance, next, "Invasion scheduled");
        next
    }

    /// Game minutes from `clock` to the start of the scheduled day.
    fn minutes_until_next(
        schedule: &InvasionSchedule,
        clock: GameClock,
        tuning: &InvasionTuning,
    ) -> Option<u32> {
        let next = schedule.next_invasion_day?;
        let start = u64::from(next) * u64::from(tuning.minutes_per_day);
        let now = u64::from(clock.day) * u64::from(tuning.minutes_per_day) + u64::from(clock.minute);
        (start > now).then(|| (start - now) as u32)
    }
}
