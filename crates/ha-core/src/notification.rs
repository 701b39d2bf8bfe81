//! Notification records dispatched through the trigger engine
//!
//! A notification is either decoded from a hub `state_changed` event or
//! built locally by a producer that feeds the injection port (for example
//! a gesture classifier reporting `hand.bedroom`). Both look the same to
//! trigger conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{StateChangedData, STATE_CHANGED, SYNTHETIC};
use crate::{Context, State};

/// Where a notification came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationOrigin {
    /// Received on the hub's live event feed
    #[default]
    Hub,
    /// Pushed through the injection port
    Synthetic,
}

/// A state-change notification
///
/// The engine never inspects these fields itself; they exist for trigger
/// conditions and actions. Missing fields are how a condition recognises a
/// notification that is not meant for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Event type tag (`state_changed` for hub notifications)
    pub event_type: String,

    /// Subject of the notification
    pub entity_id: String,

    /// State before the change
    #[serde(default)]
    pub old_state: Option<State>,

    /// State after the change
    #[serde(default)]
    pub new_state: Option<State>,

    /// Extra payload fields, e.g. `msg` for gesture notifications
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,

    /// Where the notification came from
    #[serde(default)]
    pub origin: NotificationOrigin,

    /// When the notification was produced
    pub time_fired: DateTime<Utc>,

    /// Hub context, or a fresh one for local notifications
    #[serde(default)]
    pub context: Context,
}

impl Notification {
    /// Build a hub-style `state_changed` notification
    pub fn state_changed(
        entity_id: impl Into<String>,
        old_state: Option<State>,
        new_state: Option<State>,
    ) -> Self {
        Self {
            event_type: STATE_CHANGED.to_string(),
            entity_id: entity_id.into(),
            old_state,
            new_state,
            data: serde_json::Map::new(),
            origin: NotificationOrigin::Hub,
            time_fired: Utc::now(),
            context: Context::new(),
        }
    }

    /// Build a notification from decoded hub event data
    pub fn from_hub(
        data: StateChangedData,
        time_fired: Option<DateTime<Utc>>,
        context: Option<Context>,
    ) -> Self {
        let mut notification = Self::state_changed(data.entity_id, data.old_state, data.new_state);
        if let Some(time_fired) = time_fired {
            notification.time_fired = time_fired;
        }
        if let Some(context) = context {
            notification.context = context;
        }
        notification
    }

    /// Build a notification for the injection port
    pub fn synthetic(entity_id: impl Into<String>) -> Self {
        Self {
            event_type: SYNTHETIC.to_string(),
            entity_id: entity_id.into(),
            old_state: None,
            new_state: None,
            data: serde_json::Map::new(),
            origin: NotificationOrigin::Synthetic,
            time_fired: Utc::now(),
            context: Context::new(),
        }
    }

    /// Attach the `msg` payload field
    pub fn with_message(self, msg: impl Into<String>) -> Self {
        self.with_data("msg", serde_json::Value::String(msg.into()))
    }

    /// Attach an arbitrary payload field
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Override the event type tag
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Whether this notification is about `entity_id`
    pub fn is_about(&self, entity_id: &str) -> bool {
        self.entity_id == entity_id
    }

    /// Whether this is a hub `state_changed` notification
    pub fn is_state_change(&self) -> bool {
        self.event_type == STATE_CHANGED
    }

    /// Previous state value, if any
    pub fn old_value(&self) -> Option<&str> {
        self.old_state.as_ref().map(|s| s.state.as_str())
    }

    /// New state value, if any
    pub fn new_value(&self) -> Option<&str> {
        self.new_state.as_ref().map(|s| s.state.as_str())
    }

    /// String attribute of the new state
    pub fn new_attribute_str(&self, key: &str) -> Option<&str> {
        self.new_state.as_ref().and_then(|s| s.attribute_str(key))
    }

    /// Whether the state value went from `from` to `to`
    pub fn transitioned(&self, from: &str, to: &str) -> bool {
        self.old_value() == Some(from) && self.new_value() == Some(to)
    }

    /// The `msg` payload field
    pub fn message(&self) -> Option<&str> {
        self.data.get("msg").and_then(|v| v.as_str())
    }
}
