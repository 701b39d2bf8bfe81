//! Frames received on the hub WebSocket

use chrono::{DateTime, Utc};
use ha_core::events::{StateChangedData, STATE_CHANGED};
use ha_core::{Context, Notification};
use serde::Deserialize;
use serde_json::Value;

/// A decoded hub frame
///
/// Only the fields the client acts on are modelled; anything else the hub
/// sends decodes as [`HubMessage::Other`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default = "default_success")]
        success: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<Value>,
    },
    Event {
        #[serde(default)]
        id: Option<u64>,
        event: HubEvent,
    },
    Pong {
        #[serde(default)]
        id: Option<u64>,
    },
    #[serde(other)]
    Other,
}

fn default_success() -> bool {
    true
}

/// Body of an `event` frame
#[derive(Debug, Clone, Deserialize)]
pub struct HubEvent {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub time_fired: Option<DateTime<Utc>>,
    #[serde(default)]
    pub context: Option<Context>,
}

impl HubEvent {
    /// Convert a `state_changed` event into a notification
    ///
    /// Returns `None` for every other event type. Missing or malformed
    /// fields are left empty rather than rejected, so conditions see an
    /// incomplete notification instead of the listener failing.
    pub fn into_notification(self) -> Option<Notification> {
        if self.event_type != STATE_CHANGED {
            return None;
        }

        let data = StateChangedData {
            entity_id: self
                .data
                .get("entity_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            old_state: decode_state(&self.data, "old_state"),
            new_state: decode_state(&self.data, "new_state"),
        };

        Some(Notification::from_hub(data, self.time_fired, self.context))
    }
}

fn decode_state<T: serde::de::DeserializeOwned>(data: &Value, key: &str) -> Option<T> {
    data.get(key)
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}
