//! Core types for the household runtime
//!
//! This crate provides the types shared by every other crate in the
//! workspace: entity ids, entity states as reported by the hub, and the
//! [`Notification`] record that flows through the trigger engine.

mod context;
mod entity_id;
mod notification;
mod state;

pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use notification::{Notification, NotificationOrigin};
pub use state::State;

/// State value reported for a device that is switched on
pub const STATE_ON: &str = "on";

/// State value reported for a device that is switched off
pub const STATE_OFF: &str = "off";

/// State value reported when the hub cannot reach a device
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Standard event types seen on the hub feed
pub mod events {
    use super::State;

    /// Event type for state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Event type used for notifications pushed through the injection port
    pub const SYNTHETIC: &str = "synthetic";

    /// Payload of a hub `state_changed` event
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: String,
        #[serde(default)]
        pub old_state: Option<State>,
        #[serde(default)]
        pub new_state: Option<State>,
    }
}
