//! Invasion lifecycle events and the listener registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::battle::RoundReport;
use crate::outcome::DetailedInvasionResult;
use crate::prisoners::{CapturedPrisoner, PrisonerOutcome};
use crate::rewards::InvasionRewards;

/// Something the rest of the game may want to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvasionEvent {
    /// An invasion is imminent.
    Warned {
        /// Day of the coming invasion.
        day: u32,
        /// Minutes until it arrives.
        minutes_left: u32,
    },
    /// An invasion has begun.
    Triggered {
        /// New invasion id.
        invasion_id: String,
        /// Current day.
        day: u32,
        /// Invaders in the party.
        party_size: usize,
        /// Label of the special invasion, if any.
        special: Option<String>,
    },
    /// An invasion was due but no party could be assembled.
    Skipped {
        /// Current day.
        day: u32,
        /// Why.
        reason: String,
    },
    /// One battle round finished.
    RoundPlayed {
        /// Running invasion.
        invasion_id: String,
        /// Round summary.
        report: RoundReport,
    },
    /// An invasion finished and its consequences were applied.
    Ended {
        /// Final summary.
        result: DetailedInvasionResult,
        /// Rewards (or penalties) applied.
        rewards: InvasionRewards,
    },
    /// A surviving invader was taken prisoner.
    PrisonerCaptured {
        /// The new prisoner.
        prisoner: CapturedPrisoner,
    },
    /// The player dealt with a prisoner.
    PrisonerHandled {
        /// What happened.
        outcome: PrisonerOutcome,
    },
}

/// Receives invasion events.
pub trait InvasionListener {
    /// Called once per event, in emission order.
    fn on_event(&mut self, event: &InvasionEvent);
}

impl<F: FnMut(&InvasionEvent)> InvasionListener for F {
    fn on_event(&mut self, event: &InvasionEvent) {
        self(event);
    }
}

/// Registry of listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn InvasionListener>>,
}

impl EventBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners are called in registration order.
    pub fn subscribe(&mut self, listener: impl InvasionListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver `events` to every listener.
    pub fn publish(&mut self, events: &[InvasionEvent]) {
        for event in events {
            for listener in &mut self.listeners {
                listener.on_event(event);
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
