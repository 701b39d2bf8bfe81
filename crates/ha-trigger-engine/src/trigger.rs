//! Trigger types
//!
//! A trigger pairs a condition with an action and an optional minimum
//! duration. Triggers are immutable once registered; only their debounce
//! state changes, and only through dispatch.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use ha_core::Notification;
use tokio::time::Instant;

use crate::debounce::{decide_level, Decision, DurationGate, GateState};
use crate::error::BoxError;

/// Three-valued result of a trigger condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOutcome {
    /// The condition holds
    Met,
    /// The condition does not hold
    Unmet,
    /// The notification is not relevant to this trigger
    Indeterminate,
}

impl From<bool> for ConditionOutcome {
    fn from(value: bool) -> Self {
        if value {
            ConditionOutcome::Met
        } else {
            ConditionOutcome::Unmet
        }
    }
}

impl From<Option<bool>> for ConditionOutcome {
    fn from(value: Option<bool>) -> Self {
        value.map_or(ConditionOutcome::Indeterminate, ConditionOutcome::from)
    }
}

/// Notification handed to conditions and actions; `None` on heartbeat ticks
pub type Payload = Option<Arc<Notification>>;

/// Future returned by a condition
pub type ConditionFuture = Pin<Box<dyn Future<Output = Result<ConditionOutcome, BoxError>> + Send>>;

/// Future returned by an action
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// Type-erased condition
pub type ConditionFn = Arc<dyn Fn(Payload) -> ConditionFuture + Send + Sync>;

/// Type-erased action
pub type ActionFn = Arc<dyn Fn(Payload) -> ActionFuture + Send + Sync>;

/// Handle returned by registration; the trigger's position in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerHandle(pub(crate) usize);

impl TriggerHandle {
    /// Registration index of the trigger
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Point-in-time view of a trigger's debounce state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerStatus {
    pub handle: TriggerHandle,
    pub name: String,
    pub min_duration: Option<Duration>,
    /// Fired during the current true-interval and waiting for a false
    pub armed: bool,
    /// Last false evaluation (registration time initially); `None` without a duration
    pub last_false_at: Option<Instant>,
}

/// A registered trigger
pub(crate) struct Trigger {
    pub(crate) handle: TriggerHandle,
    pub(crate) name: String,
    pub(crate) condition: ConditionFn,
    pub(crate) action: ActionFn,
    gate: Option<DurationGate>,
}

impl Trigger {
    pub(crate) fn new(
        handle: TriggerHandle,
        name: String,
        condition: ConditionFn,
        action: ActionFn,
        min_duration: Option<Duration>,
        registered_at: Instant,
    ) -> Self {
        Self {
            handle,
            name,
            condition,
            action,
            gate: min_duration.map(|min| DurationGate::new(min, registered_at)),
        }
    }

    /// Feed one condition outcome through the debounce tracker
    pub(crate) fn decide(&self, outcome: ConditionOutcome, now: Instant) -> Decision {
        match &self.gate {
            Some(gate) => gate.decide(outcome, now),
            None => decide_level(outcome),
        }
    }

    pub(crate) fn status(&self) -> TriggerStatus {
        let (armed, last_false_at) = match self.gate.as_ref().map(DurationGate::snapshot) {
            Some(GateState::Counting { since }) => (false, Some(since)),
            Some(GateState::Fired { since }) => (true, Some(since)),
            None => (false, None),
        };

        TriggerStatus {
            handle: self.handle,
            name: self.name.clone(),
            min_duration: self.gate.as_ref().map(DurationGate::min),
            armed,
            last_false_at,
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_trigger(min_duration: Option<Duration>, at: Instant) -> Trigger {
        let condition: ConditionFn = Arc::new(|_: Payload| -> ConditionFuture {
            Box::pin(async { Ok::<_, BoxError>(ConditionOutcome::Met) })
        });
        let action: ActionFn =
            Arc::new(|_: Payload| -> ActionFuture { Box::pin(async { Ok::<_, BoxError>(()) }) });
        Trigger::new(
            TriggerHandle(0),
            "noop".to_string(),
            condition,
            action,
            min_duration,
            at,
        )
    }

    #[test]
    fn test_outcome_conversions() {
        assert_eq!(ConditionOutcome::from(true), ConditionOutcome::Met);
        assert_eq!(ConditionOutcome::from(false), ConditionOutcome::Unmet);
        assert_eq!(ConditionOutcome::from(None), ConditionOutcome::Indeterminate);
        assert_eq!(ConditionOutcome::from(Some(true)), ConditionOutcome::Met);
    }

    #[test]
    fn test_status_without_duration() {
        let trigger = noop_trigger(None, Instant::now());
        let status = trigger.status();
        assert!(!status.armed);
        assert!(status.last_false_at.is_none());
        assert!(status.min_duration.is_none());
    }

    #[test]
    fn test_status_tracks_gate() {
        let t0 = Instant::now();
        let trigger = noop_trigger(Some(Duration::from_secs(5)), t0);
        assert_eq!(trigger.status().last_false_at, Some(t0));

        assert_eq!(
            trigger.decide(ConditionOutcome::Met, t0 + Duration::from_secs(5)),
            Decision::Fire
        );
        let status = trigger.status();
        assert!(status.armed);
        assert_eq!(status.last_false_at, Some(t0));
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(TriggerHandle(3).to_string(), "#3");
        assert_eq!(TriggerHandle(3).index(), 3);
    }
}
