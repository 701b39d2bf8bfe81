//! Error types for the hub transport

use thiserror::Error;

/// Errors from the WebSocket connection
#[derive(Debug, Error)]
pub enum HubError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid JSON from hub: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hub did not ask for authentication: {0}")]
    UnexpectedHandshake(String),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error("response id mismatch: sent {expected}, received {received:?}")]
    IdMismatch { expected: u64, received: Option<u64> },

    #[error("command {command} failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("connection closed by hub")]
    Closed,

    #[error("timed out waiting for the hub")]
    Timeout,
}

/// Result type for WebSocket operations
pub type HubResult<T> = Result<T, HubError>;

/// Errors from the REST API
#[derive(Debug, Error)]
pub enum RestError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
}

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;
