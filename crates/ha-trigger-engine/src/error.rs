//! Error types for the trigger engine

use thiserror::Error;

/// Boxed error returned by trigger conditions, actions and notification sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("notification source failed: {0}")]
    Source(#[source] BoxError),

    #[error("trigger engine is already running")]
    AlreadyRunning,

    #[error("injection port is closed")]
    InjectorClosed,

    #[error("unknown trigger handle: {0}")]
    UnknownTrigger(usize),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
