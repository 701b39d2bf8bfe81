//! Hub Client
//!
//! Transport to the home-automation hub:
//!
//! - [`HubConnection`] - authenticated WebSocket; registry queries and the
//!   `state_changed` feed, which the trigger engine consumes as a
//!   [`NotificationSource`](ha_trigger_engine::NotificationSource)
//! - [`HassApi`] - REST client for state reads and service calls

pub mod error;
pub mod messages;
pub mod rest;
pub mod websocket;

pub use error::{HubError, HubResult, RestError, RestResult};
pub use messages::{HubEvent, HubMessage};
pub use rest::HassApi;
pub use websocket::HubConnection;
