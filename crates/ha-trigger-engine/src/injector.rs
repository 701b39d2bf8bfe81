//! Synthetic injection port
//!
//! Producers that are not the hub connection (a gesture classifier, the
//! operator console, a sensor thread) push notifications here. They are
//! queued and dispatched by the engine's injection task through the same
//! path as hub notifications, in the order each injector sent them.

use ha_core::Notification;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{EngineError, EngineResult};

/// Cloneable handle to the injection port
///
/// `fire_event` never blocks, so it is safe to call from plain OS threads.
/// Notifications injected while the engine is stopped are held until the
/// next start.
#[derive(Debug, Clone)]
pub struct EventInjector {
    tx: mpsc::UnboundedSender<Notification>,
}

impl EventInjector {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    /// Queue a notification for dispatch
    pub fn fire_event(&self, notification: Notification) -> EngineResult<()> {
        trace!(entity_id = %notification.entity_id, "Injecting notification");
        self.tx
            .send(notification)
            .map_err(|_| EngineError::InjectorClosed)
    }

    /// Whether the engine behind this injector has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
