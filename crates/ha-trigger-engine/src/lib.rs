//! Trigger Engine
//!
//! This crate runs the household's rules. A rule is a trigger: a condition
//! evaluated against every incoming notification, an action run when the
//! condition holds, and an optional minimum duration the condition must hold
//! before the action runs.
//!
//! # Architecture
//!
//! ```text
//!  hub feed ──► listener ──┐
//!  heartbeat (None) ───────┼──► dispatch ──► trigger[0] ─► trigger[1] ─► ...
//!  EventInjector ──────────┘      (one pass at a time)
//! ```
//!
//! - **Listener**: drains a [`NotificationSource`] such as the hub connection
//! - **Heartbeat**: dispatches `None` every few seconds so duration triggers
//!   can fire while no notification arrives
//! - **Injection port**: queues notifications built by the program itself
//!
//! # Key Types
//!
//! - [`TriggerEngine`] - Registry, dispatch and background tasks
//! - [`ConditionOutcome`] - Met, unmet or indeterminate
//! - [`EventInjector`] - Thread-safe handle to the injection port
//! - [`NotificationSource`] - Anything the listener can drain

pub mod debounce;
pub mod engine;
pub mod error;
pub mod injector;
pub mod source;
pub mod trigger;

pub use debounce::Decision;
pub use engine::{
    DispatchReport, EngineConfig, EngineTasks, TriggerEngine, DEFAULT_HEARTBEAT_INTERVAL,
};
pub use error::{BoxError, EngineError, EngineResult};
pub use injector::EventInjector;
pub use source::NotificationSource;
pub use trigger::{
    ActionFn, ActionFuture, ConditionFn, ConditionFuture, ConditionOutcome, Payload,
    TriggerHandle, TriggerStatus,
};
