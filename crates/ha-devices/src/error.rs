//! Error types for the device layer

use ha_client::{HubError, RestError};
use thiserror::Error;

/// Device layer errors
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("hub connection failed: {0}")]
    Hub(#[from] HubError),

    #[error("hub request failed: {0}")]
    Rest(#[from] RestError),

    #[error("malformed {registry} registry: {source}")]
    Registry {
        registry: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected exactly one device, found {0}")]
    NotSingle(usize),

    #[error("device {0} has no domain to call services on")]
    NoDomain(String),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;
