//! Trigger engine
//!
//! The `TriggerEngine` owns the trigger registry and runs every dispatch
//! pass. Three kinds of context feed it: the listener task draining a
//! [`NotificationSource`], the heartbeat task dispatching `None` on a fixed
//! interval, and the injection task draining the [`EventInjector`] queue.
//! Passes are serialized by one dispatch lock, so a trigger's debounce
//! state is never evaluated by two passes at once.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::FutureExt;
use ha_core::Notification;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::debounce::Decision;
use crate::error::{BoxError, EngineError, EngineResult};
use crate::injector::EventInjector;
use crate::source::NotificationSource;
use crate::trigger::{
    ActionFn, ActionFuture, ConditionFn, ConditionFuture, ConditionOutcome, Payload, Trigger,
    TriggerHandle, TriggerStatus,
};

/// Default heartbeat interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often the heartbeat dispatches a `None` notification
    pub heartbeat_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Summary of one dispatch pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of triggers evaluated
    pub evaluated: usize,
    /// Triggers whose action ran, in firing order
    pub fired: Vec<TriggerHandle>,
    /// Conditions that returned an error or panicked
    pub condition_errors: usize,
    /// Actions that returned an error or panicked
    pub action_errors: usize,
}

/// Background tasks spawned by [`TriggerEngine::start`]
#[derive(Debug)]
pub struct EngineTasks {
    /// Listener task; `None` when started without a source
    pub listener: Option<JoinHandle<EngineResult<()>>>,
    pub heartbeat: JoinHandle<()>,
    pub injection: JoinHandle<()>,
}

/// Event trigger engine
pub struct TriggerEngine {
    config: EngineConfig,
    /// Registered triggers in evaluation order
    triggers: RwLock<Vec<Arc<Trigger>>>,
    /// Serializes dispatch passes across all sources
    dispatch_lock: tokio::sync::Mutex<()>,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    inject_tx: mpsc::UnboundedSender<Notification>,
    /// Held by the running injection task; a restarted task waits for the
    /// previous one to let go
    inject_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Notification>>,
}

impl TriggerEngine {
    /// Create an engine with the given settings
    pub fn new(config: EngineConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();

        Self {
            config,
            triggers: RwLock::new(Vec::new()),
            dispatch_lock: tokio::sync::Mutex::new(()),
            running: AtomicBool::new(false),
            shutdown_tx,
            inject_tx,
            inject_rx: tokio::sync::Mutex::new(inject_rx),
        }
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- Registry ---

    /// Register a trigger
    ///
    /// `condition` is called on every dispatch with the notification (`None`
    /// on heartbeat ticks) and returns anything convertible to a
    /// [`ConditionOutcome`]: a `bool`, an `Option<bool>` where `None` means
    /// indeterminate, or the outcome itself. `action` runs with the same
    /// notification whenever the trigger fires. With `min_duration`, the
    /// condition must hold continuously that long and the trigger fires
    /// once per true-interval.
    pub fn register<C, CFut, O, A, AFut>(
        &self,
        condition: C,
        action: A,
        min_duration: Option<Duration>,
    ) -> TriggerHandle
    where
        C: Fn(Payload) -> CFut + Send + Sync + 'static,
        CFut: Future<Output = Result<O, BoxError>> + Send + 'static,
        O: Into<ConditionOutcome> + Send + 'static,
        A: Fn(Payload) -> AFut + Send + Sync + 'static,
        AFut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.insert(None, erase_condition(condition), erase_action(action), min_duration)
    }

    /// Register a trigger with a name used in log records
    pub fn register_named<C, CFut, O, A, AFut>(
        &self,
        name: impl Into<String>,
        condition: C,
        action: A,
        min_duration: Option<Duration>,
    ) -> TriggerHandle
    where
        C: Fn(Payload) -> CFut + Send + Sync + 'static,
        CFut: Future<Output = Result<O, BoxError>> + Send + 'static,
        O: Into<ConditionOutcome> + Send + 'static,
        A: Fn(Payload) -> AFut + Send + Sync + 'static,
        AFut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.insert(
            Some(name.into()),
            erase_condition(condition),
            erase_action(action),
            min_duration,
        )
    }

    fn insert(
        &self,
        name: Option<String>,
        condition: ConditionFn,
        action: ActionFn,
        min_duration: Option<Duration>,
    ) -> TriggerHandle {
        let mut triggers = self.triggers.write().unwrap_or_else(PoisonError::into_inner);
        let handle = TriggerHandle(triggers.len());
        let name = name.unwrap_or_else(|| format!("trigger-{}", handle.0));

        debug!(trigger = %name, %handle, ?min_duration, "Registering trigger");

        triggers.push(Arc::new(Trigger::new(
            handle,
            name,
            condition,
            action,
            min_duration,
            Instant::now(),
        )));
        handle
    }

    /// Number of registered triggers
    pub fn len(&self) -> usize {
        self.triggers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no trigger has been registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Debounce status of one trigger
    pub fn status(&self, handle: TriggerHandle) -> EngineResult<TriggerStatus> {
        self.triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle.0)
            .map(|trigger| trigger.status())
            .ok_or(EngineError::UnknownTrigger(handle.0))
    }

    /// Debounce status of every trigger, in registration order
    pub fn statuses(&self) -> Vec<TriggerStatus> {
        self.snapshot().iter().map(|trigger| trigger.status()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<Trigger>> {
        self.triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // --- Dispatch ---

    /// Evaluate every trigger against one notification
    ///
    /// Triggers are evaluated in registration order and each firing action
    /// completes before the next trigger is evaluated. A failing or
    /// panicking condition counts as indeterminate; a failing action is
    /// logged. Neither stops the pass.
    ///
    /// Actions run while the dispatch lock is held, so an action must feed
    /// follow-up notifications through an [`EventInjector`] rather than
    /// calling [`fire_event`](Self::fire_event).
    pub async fn dispatch(&self, notification: Option<Notification>) -> DispatchReport {
        let payload: Payload = notification.map(Arc::new);
        let _guard = self.dispatch_lock.lock().await;

        let mut report = DispatchReport::default();

        for trigger in self.snapshot() {
            report.evaluated += 1;

            let outcome = match evaluate_condition(&trigger, payload.clone()).await {
                Ok(outcome) => outcome,
                Err(reason) => {
                    report.condition_errors += 1;
                    warn!(
                        trigger = %trigger.name,
                        error = %reason,
                        "Condition failed, treating as indeterminate"
                    );
                    ConditionOutcome::Indeterminate
                }
            };

            let decision = trigger.decide(outcome, Instant::now());
            trace!(trigger = %trigger.name, ?outcome, ?decision, "Evaluated trigger");

            if decision != Decision::Fire {
                continue;
            }

            debug!(trigger = %trigger.name, "Trigger fired");
            report.fired.push(trigger.handle);

            if let Err(reason) = run_action(&trigger, payload.clone()).await {
                report.action_errors += 1;
                error!(trigger = %trigger.name, error = %reason, "Trigger action failed");
            }
        }

        report
    }

    /// Dispatch a heartbeat tick
    pub async fn tick(&self) -> DispatchReport {
        self.dispatch(None).await
    }

    /// Dispatch an externally built notification right away
    pub async fn fire_event(&self, notification: Notification) -> DispatchReport {
        trace!(entity_id = %notification.entity_id, "Firing synthetic notification");
        self.dispatch(Some(notification)).await
    }

    /// A handle to the injection port usable from any thread
    pub fn injector(&self) -> EventInjector {
        EventInjector::new(self.inject_tx.clone())
    }

    /// Dispatch every notification produced by `source` until it ends or fails
    pub async fn listen<S: NotificationSource>(&self, mut source: S) -> EngineResult<()> {
        info!("Listening for notifications");

        loop {
            match source.next_notification().await {
                Ok(Some(notification)) => {
                    trace!(
                        entity_id = %notification.entity_id,
                        event_type = %notification.event_type,
                        "Received notification"
                    );
                    self.dispatch(Some(notification)).await;
                }
                Ok(None) => {
                    info!("Notification source closed");
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Notification source failed");
                    return Err(EngineError::Source(Box::new(e)));
                }
            }
        }
    }

    // --- Lifecycle ---

    /// Start the listener, heartbeat and injection tasks
    ///
    /// If the listener dies, the heartbeat and injection tasks keep running.
    pub fn start<S>(self: &Arc<Self>, source: S) -> EngineResult<EngineTasks>
    where
        S: NotificationSource + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tasks = self.start_detached()?;

        let engine = self.clone();
        tasks.listener = Some(tokio::spawn(async move {
            tokio::select! {
                result = engine.listen(source) => result,
                _ = shutdown_rx.recv() => {
                    debug!("Listener stopped");
                    Ok(())
                }
            }
        }));

        Ok(tasks)
    }

    /// Start only the heartbeat and injection tasks
    pub fn start_detached(self: &Arc<Self>) -> EngineResult<EngineTasks> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Trigger engine already running");
            return Err(EngineError::AlreadyRunning);
        }

        info!(
            heartbeat_interval = ?self.config.heartbeat_interval,
            triggers = self.len(),
            "Starting trigger engine"
        );

        let heartbeat = tokio::spawn(self.clone().run_heartbeat(self.shutdown_tx.subscribe()));
        let injection = tokio::spawn(self.clone().run_injection(self.shutdown_tx.subscribe()));

        Ok(EngineTasks {
            listener: None,
            heartbeat,
            injection,
        })
    }

    /// Signal every engine task to stop
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping trigger engine");
        if self.shutdown_tx.send(()).is_err() {
            trace!("No engine tasks left to signal");
        }
    }

    /// Check if the engine tasks are running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run_heartbeat(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.dispatch(None).await;
                    trace!(fired = report.fired.len(), "Heartbeat dispatched");
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        debug!("Heartbeat stopped");
    }

    async fn run_injection(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut inject_rx = self.inject_rx.lock().await;
        loop {
            tokio::select! {
                received = inject_rx.recv() => match received {
                    Some(notification) => {
                        self.dispatch(Some(notification)).await;
                    }
                    None => break,
                },
                _ = shutdown_rx.recv() => break,
            }
        }

        debug!("Injection port stopped");
    }
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn erase_condition<C, CFut, O>(condition: C) -> ConditionFn
where
    C: Fn(Payload) -> CFut + Send + Sync + 'static,
    CFut: Future<Output = Result<O, BoxError>> + Send + 'static,
    O: Into<ConditionOutcome> + Send + 'static,
{
    Arc::new(move |payload| {
        let fut = condition(payload);
        Box::pin(async move { fut.await.map(Into::into) }) as ConditionFuture
    })
}

fn erase_action<A, AFut>(action: A) -> ActionFn
where
    A: Fn(Payload) -> AFut + Send + Sync + 'static,
    AFut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(action(payload)) as ActionFuture)
}

async fn evaluate_condition(trigger: &Trigger, payload: Payload) -> Result<ConditionOutcome, String> {
    match AssertUnwindSafe(async { (trigger.condition)(payload).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic)),
    }
}

async fn run_action(trigger: &Trigger, payload: Payload) -> Result<(), String> {
    match AssertUnwindSafe(async { (trigger.action)(payload).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic)),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown payload".to_string());
    format!("panicked: {}", detail)
}
