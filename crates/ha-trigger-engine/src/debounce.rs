//! Duration gating for triggers
//!
//! A trigger registered with a minimum duration only fires after its
//! condition has been observed true continuously for that long, and then
//! fires once. It re-arms only after the condition is observed false.
//!
//! ```text
//!             Met, elapsed >= min
//!  Counting ──────────────────────► Fired
//!   │  ▲                              │
//!   │  │ Unmet (since = now)          │ Unmet (since = now)
//!   └──┘◄─────────────────────────────┘
//! ```
//!
//! `Indeterminate` never moves the gate in either state.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::trigger::ConditionOutcome;

/// What one evaluation of a trigger decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Condition was indeterminate, nothing changed
    Ignored,
    /// Condition was false on a trigger without a duration
    Idle,
    /// Condition was false on a duration trigger, countdown restarted
    Reset,
    /// Condition true but the duration has not elapsed yet
    Waiting,
    /// Condition true but the trigger already fired this interval
    Suppressed,
    /// Run the action
    Fire,
}

/// Debounce state of a duration trigger
///
/// `since` is the last time the condition was observed false, or the
/// registration time if it never was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateState {
    Counting { since: Instant },
    Fired { since: Instant },
}

impl GateState {
    /// Advance the state machine by one evaluation
    pub(crate) fn step(
        self,
        min: Duration,
        outcome: ConditionOutcome,
        now: Instant,
    ) -> (GateState, Decision) {
        match (self, outcome) {
            (state, ConditionOutcome::Indeterminate) => (state, Decision::Ignored),
            (_, ConditionOutcome::Unmet) => (GateState::Counting { since: now }, Decision::Reset),
            (GateState::Fired { since }, ConditionOutcome::Met) => {
                (GateState::Fired { since }, Decision::Suppressed)
            }
            (GateState::Counting { since }, ConditionOutcome::Met) => {
                if now.saturating_duration_since(since) >= min {
                    (GateState::Fired { since }, Decision::Fire)
                } else {
                    (GateState::Counting { since }, Decision::Waiting)
                }
            }
        }
    }
}

/// A duration gate owned by one trigger
#[derive(Debug)]
pub(crate) struct DurationGate {
    min: Duration,
    state: Mutex<GateState>,
}

impl DurationGate {
    pub(crate) fn new(min: Duration, registered_at: Instant) -> Self {
        Self {
            min,
            state: Mutex::new(GateState::Counting {
                since: registered_at,
            }),
        }
    }

    pub(crate) fn min(&self) -> Duration {
        self.min
    }

    /// Apply one evaluation and return the decision
    pub(crate) fn decide(&self, outcome: ConditionOutcome, now: Instant) -> Decision {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (next, decision) = state.step(self.min, outcome, now);
        *state = next;
        decision
    }

    pub(crate) fn snapshot(&self) -> GateState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decision for a trigger without a duration: fire on every true evaluation
pub(crate) fn decide_level(outcome: ConditionOutcome) -> Decision {
    match outcome {
        ConditionOutcome::Met => Decision::Fire,
        ConditionOutcome::Unmet => Decision::Idle,
        ConditionOutcome::Indeterminate => Decision::Ignored,
    }
}
