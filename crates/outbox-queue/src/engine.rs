//! Queue engine: serial execution with pause, resume and head-first retry.
//!
//! One worker task owns every call into the [`OperationHandler`]. Callers
//! never touch the handler; they mutate the run list under the engine lock
//! and nudge the worker through a single-slot wake channel, which collapses
//! bursts of enqueues and resume requests into one re-evaluation.
//!
//! ```text
//!            enqueue / resume()          reachability watch
//!                   │                            │
//!                   ▼                            ▼
//!   ┌──────┐  work  ┌─────────┐  failure / ┌────────┐
//!   │ Idle │ ─────▶ │ Running │ ─────────▶ │ Paused │
//!   └──────┘ ◀───── └─────────┘ ◀───────── └────────┘
//!            empty               should_resume
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use outbox_config::{ConfigValidator, OutboxConfig, QueueConfig};

use crate::error::QueueError;
use crate::handler::{ExecutionOutcome, OperationHandler};
use crate::operation::{validate_payload, Opcode, OperationRecord, Payload, Sequence};
use crate::reachability::{ManualReachability, ProbeReachability, ReachabilityMonitor};
use crate::run_list::RunList;
use crate::sqlite_store::SqliteOperationStore;
use crate::stats::{QueueStats, StatsSnapshot};
use crate::store::{MemoryOperationStore, OperationStore};

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Not launched yet, or launched with nothing left to do.
    Idle,
    /// Draining the run list.
    Running,
    /// Waiting for a resume trigger.
    Paused,
}

/// State guarded by the engine lock.
struct Inner {
    run_list: RunList,
    /// Record currently handed to the handler.
    in_flight: Option<OperationRecord>,
    state: QueueState,
    launched: bool,
    /// Whether the run list has been loaded from the store.
    seeded: bool,
    /// Paused because an attempt failed; only a resume trigger clears it.
    failure_pending: bool,
}

struct Shared {
    store: Arc<dyn OperationStore>,
    handler: Arc<dyn OperationHandler>,
    reachability: Arc<dyn ReachabilityMonitor>,
    launch_delay: Duration,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<QueueState>,
    wake_tx: mpsc::Sender<()>,
    resume_requested: AtomicBool,
    shutdown: CancellationToken,
    stats: QueueStats,
}

/// Durable serial offline operation queue.
pub struct OfflineQueue {
    shared: Arc<Shared>,
    wake_rx: parking_lot::Mutex<Option<mpsc::Receiver<()>>>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
    /// Set when the queue was built by [`OfflineQueue::open`].
    probe: Option<Arc<ProbeReachability>>,
}

impl OfflineQueue {
    /// Start building a queue.
    pub fn builder() -> OfflineQueueBuilder {
        OfflineQueueBuilder::default()
    }

    /// Build a queue from configuration: SQLite store, TCP probe reachability.
    pub async fn open<H: OperationHandler>(config: &OutboxConfig, handler: H) -> Result<Self, QueueError> {
        ConfigValidator::validate(config).into_result()?;

        let store = SqliteOperationStore::open(config.storage.resolved_db_path()).await?;
        let probe = Arc::new(ProbeReachability::spawn(&config.reachability));

        let mut queue = Self::builder()
            .store(Arc::new(store))
            .handler(handler)
            .reachability(probe.clone())
            .queue_config(&config.queue)
            .build()?;
        queue.probe = Some(probe);
        Ok(queue)
    }

    /// Spawn the worker and begin the launch sequence.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self) -> Result<(), QueueError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(QueueError::Stopped);
        }
        let wake_rx = self.wake_rx.lock().take().ok_or(QueueError::AlreadyStarted)?;

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move { shared.run_worker(wake_rx).await });
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Stop the worker after the current step and wait for it to exit.
    pub async fn stop(&self) {
        self.shared.shutdown.cancel();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Queue worker ended abnormally: {}", e);
            }
        }
        info!("Offline queue stopped");
    }

    /// Persist an operation and schedule it in FIFO order.
    pub async fn enqueue(&self, opcode: Opcode, payload: Option<Payload>) -> Result<Sequence, QueueError> {
        self.enqueue_with_priority(opcode, payload, false).await
    }

    /// Persist an operation; with `high_priority` it runs ahead of everything
    /// currently pending in this process. The priority is not persisted.
    pub async fn enqueue_with_priority(
        &self,
        opcode: Opcode,
        payload: Option<Payload>,
        high_priority: bool,
    ) -> Result<Sequence, QueueError> {
        validate_payload(payload.as_ref())?;
        let mut inner = self.shared.inner.lock().await;

        let sequence = match self.shared.store.insert(opcode, payload.as_ref()).await {
            Ok(sequence) => sequence,
            Err(e) => {
                error!("Failed to persist operation (opcode {}): {}", opcode, e);
                return Err(e);
            }
        };

        inner
            .run_list
            .push(OperationRecord::new(sequence, opcode, payload), high_priority);
        drop(inner);

        debug!(
            "Enqueued operation {} (opcode {}, high priority: {})",
            sequence, opcode, high_priority
        );
        self.shared.wake();
        Ok(sequence)
    }

    /// Ask a paused queue to resume. Subject to reachability and `should_resume`.
    pub fn resume(&self) {
        self.shared.resume_requested.store(true, Ordering::SeqCst);
        self.shared.wake();
    }

    /// Current state.
    pub fn state(&self) -> QueueState {
        *self.shared.state_tx.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<QueueState> {
        self.shared.state_tx.subscribe()
    }

    /// Pending records in the order they will run, the in-flight one first.
    pub async fn pending(&self) -> Vec<OperationRecord> {
        let inner = self.shared.inner.lock().await;
        inner
            .in_flight
            .iter()
            .chain(inner.run_list.records())
            .cloned()
            .collect()
    }

    /// Number of pending records, including the in-flight one.
    pub async fn pending_count(&self) -> usize {
        let inner = self.shared.inner.lock().await;
        inner.run_list.len() + usize::from(inner.in_flight.is_some())
    }

    /// Execution counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// The monitor gating execution.
    pub fn reachability(&self) -> &Arc<dyn ReachabilityMonitor> {
        &self.shared.reachability
    }

    /// The TCP probe created by [`OfflineQueue::open`], for reporting the
    /// link kind or forcing a probe. `None` for builder-made queues.
    pub fn probe(&self) -> Option<&Arc<ProbeReachability>> {
        self.probe.as_ref()
    }
}

impl Drop for OfflineQueue {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

/// Outcome of inspecting the run list before a step.
enum Step {
    Execute(OperationRecord),
    Finished,
    PausedUnreachable,
    Stopping,
}

impl Shared {
    fn wake(&self) {
        // A full slot already holds a pending wake.
        let _ = self.wake_tx.try_send(());
    }

    fn is_reachable(&self) -> bool {
        self.reachability.current_state().is_reachable()
    }

    fn set_state(&self, inner: &mut MutexGuard<'_, Inner>, state: QueueState) {
        if inner.state != state {
            info!("Queue state: {:?} -> {:?}", inner.state, state);
        }
        inner.state = state;
        self.state_tx.send_replace(state);
    }

    async fn run_worker(&self, mut wake_rx: mpsc::Receiver<()>) {
        let mut reach_rx = self.reachability.subscribe();
        reach_rx.borrow_and_update();
        let mut reach_open = true;

        // Only an unreachable -> reachable edge triggers a resume. After a
        // drain the edge baseline is the current state, so notifications
        // queued up during a step are not mistaken for a fresh recovery.
        let mut last_reachable = self.is_reachable();
        if self.launch().await {
            last_reachable = self.is_reachable();
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                msg = wake_rx.recv() => {
                    if msg.is_none() {
                        break;
                    }
                    if self.on_wake().await {
                        last_reachable = self.is_reachable();
                    }
                }
                changed = reach_rx.changed(), if reach_open => {
                    if changed.is_err() {
                        warn!("Reachability monitor went away; only explicit resumes will restart the queue");
                        reach_open = false;
                        continue;
                    }
                    let reachable = reach_rx.borrow_and_update().is_reachable();
                    let restored = reachable && !last_reachable;
                    last_reachable = reachable;

                    if !reachable {
                        debug!("Network unreachable");
                    } else if !restored {
                        debug!("Ignoring reachability notification without a transition");
                    } else if self.on_reachability_restored().await {
                        last_reachable = self.is_reachable();
                    }
                }
            }
        }

        debug!("Queue worker exited");
    }

    /// Returns whether the run list was drained.
    async fn launch(&self) -> bool {
        self.seed().await;
        self.handler.on_launch().await;

        if !self.launch_delay.is_zero() {
            debug!("Waiting {:?} before draining", self.launch_delay);
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = tokio::time::sleep(self.launch_delay) => {}
            }
        }

        let run = {
            let mut inner = self.inner.lock().await;
            inner.launched = true;
            let run = !inner.run_list.is_empty() && !inner.failure_pending && self.is_reachable();
            info!("Offline queue launched with {} pending operations", inner.run_list.len());
            self.set_state(
                &mut inner,
                if run { QueueState::Running } else { QueueState::Paused },
            );
            run
        };

        if run {
            self.drain().await;
        }
        run
    }

    /// Load the run list from the store.
    async fn seed(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match self.store.list_all_ordered().await {
            Ok(records) => {
                debug!("Loaded {} operations from store", records.len());
                inner.run_list.seed(records);
                inner.seeded = true;
                true
            }
            Err(e) => {
                error!("Failed to load pending operations: {}", e);
                inner.failure_pending = true;
                false
            }
        }
    }

    async fn on_wake(&self) -> bool {
        let resume = self.resume_requested.swap(false, Ordering::SeqCst);
        let (state, failure_pending, launched) = {
            let inner = self.inner.lock().await;
            (inner.state, inner.failure_pending, inner.launched)
        };
        if !launched {
            return false;
        }

        match state {
            QueueState::Paused if resume => self.try_resume("resume requested").await,
            QueueState::Idle => self.start_if_ready().await,
            QueueState::Paused if !failure_pending => self.start_if_ready().await,
            _ => false,
        }
    }

    async fn on_reachability_restored(&self) -> bool {
        let (state, launched) = {
            let inner = self.inner.lock().await;
            (inner.state, inner.launched)
        };
        if !launched {
            return false;
        }

        match state {
            QueueState::Paused => self.try_resume("reachability restored").await,
            QueueState::Idle => self.start_if_ready().await,
            QueueState::Running => false,
        }
    }

    /// Start draining new work without a resume gate.
    async fn start_if_ready(&self) -> bool {
        let run = {
            let mut inner = self.inner.lock().await;
            if inner.run_list.is_empty() {
                false
            } else if self.is_reachable() {
                self.set_state(&mut inner, QueueState::Running);
                true
            } else {
                debug!("Work pending but network unreachable");
                self.set_state(&mut inner, QueueState::Paused);
                false
            }
        };

        if run {
            self.drain().await;
        }
        run
    }

    /// Returns whether the gate let the queue resume and drain.
    async fn try_resume(&self, reason: &str) -> bool {
        let seeded = {
            let inner = self.inner.lock().await;
            if inner.seeded && inner.run_list.is_empty() {
                debug!("Not resuming ({}): nothing pending", reason);
                return false;
            }
            inner.seeded
        };
        self.stats.record_resume_attempt();

        if !self.is_reachable() {
            debug!("Not resuming ({}): network unreachable", reason);
            return false;
        }
        if !self.handler.should_resume().await {
            info!("Resume declined by handler ({})", reason);
            return false;
        }
        if !seeded && !self.seed().await {
            return false;
        }

        self.handler.on_resume().await;
        {
            let mut inner = self.inner.lock().await;
            inner.failure_pending = false;
            self.set_state(&mut inner, QueueState::Running);
        }
        info!("Queue resumed ({})", reason);

        self.drain().await;
        true
    }

    /// Execute steps until the run list is empty, an attempt fails, the
    /// network goes away, or the queue is stopped.
    async fn drain(&self) {
        loop {
            let step = {
                let mut inner = self.inner.lock().await;
                if self.shutdown.is_cancelled() {
                    self.set_state(&mut inner, QueueState::Paused);
                    Step::Stopping
                } else if inner.run_list.is_empty() {
                    self.set_state(&mut inner, QueueState::Idle);
                    Step::Finished
                } else if !self.is_reachable() {
                    self.set_state(&mut inner, QueueState::Paused);
                    Step::PausedUnreachable
                } else {
                    match inner.run_list.pop_head() {
                        Some(record) => {
                            inner.in_flight = Some(record.clone());
                            Step::Execute(record)
                        }
                        None => Step::Finished,
                    }
                }
            };

            let record = match step {
                Step::Execute(record) => record,
                Step::Finished => {
                    debug!("Run list drained");
                    return;
                }
                Step::Stopping => {
                    debug!("Stop requested, leaving remaining operations queued");
                    return;
                }
                Step::PausedUnreachable => {
                    warn!("Network lost, pausing queue");
                    self.handler.on_pause().await;
                    return;
                }
            };

            debug!(
                "Executing operation {} (opcode {})",
                record.sequence, record.opcode
            );
            let outcome = self
                .handler
                .execute(record.opcode, record.payload.as_ref())
                .await;

            match outcome {
                ExecutionOutcome::Success | ExecutionOutcome::Discard => {
                    if let Err(e) = self.store.delete(record.sequence).await {
                        error!("Failed to delete completed operation {}: {}", record.sequence, e);
                        self.stats.record_failed();
                        self.pause_after_failure(record).await;
                        return;
                    }

                    self.inner.lock().await.in_flight = None;
                    if outcome == ExecutionOutcome::Discard {
                        warn!(
                            "Operation {} (opcode {}) discarded by handler",
                            record.sequence, record.opcode
                        );
                        self.stats.record_discarded();
                    } else {
                        debug!("Operation {} completed", record.sequence);
                        self.stats.record_executed();
                    }
                }
                ExecutionOutcome::Retry => {
                    warn!(
                        "Operation {} (opcode {}) failed, pausing queue",
                        record.sequence, record.opcode
                    );
                    self.stats.record_failed();
                    self.pause_after_failure(record).await;
                    return;
                }
            }
        }
    }

    async fn pause_after_failure(&self, record: OperationRecord) {
        {
            let mut inner = self.inner.lock().await;
            inner.in_flight = None;
            inner.run_list.restore_head(record);
            inner.failure_pending = true;
            self.set_state(&mut inner, QueueState::Paused);
        }
        self.handler.on_pause().await;
    }
}

/// Builder for [`OfflineQueue`].
pub struct OfflineQueueBuilder {
    store: Option<Arc<dyn OperationStore>>,
    handler: Option<Arc<dyn OperationHandler>>,
    reachability: Option<Arc<dyn ReachabilityMonitor>>,
    launch_delay: Duration,
}

impl Default for OfflineQueueBuilder {
    fn default() -> Self {
        Self {
            store: None,
            handler: None,
            reachability: None,
            launch_delay: QueueConfig::default().launch_delay(),
        }
    }
}

impl OfflineQueueBuilder {
    /// Durable store. Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn OperationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Operation handler (required).
    pub fn handler<H: OperationHandler>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Reachability monitor. Defaults to an always-reachable manual monitor.
    pub fn reachability(mut self, reachability: Arc<dyn ReachabilityMonitor>) -> Self {
        self.reachability = Some(reachability);
        self
    }

    /// Pause between the launch hook and the first step. Defaults to 1 s.
    pub fn launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    /// Apply the `[queue]` configuration section.
    pub fn queue_config(mut self, config: &QueueConfig) -> Self {
        self.launch_delay = config.launch_delay();
        self
    }

    /// Assemble the queue. Fails with [`QueueError::MissingHandler`] when no
    /// handler was given.
    pub fn build(self) -> Result<OfflineQueue, QueueError> {
        let handler = self.handler.ok_or(QueueError::MissingHandler)?;
        let store = self.store.unwrap_or_else(|| {
            warn!("No durable store configured, pending operations will not survive a restart");
            Arc::new(MemoryOperationStore::new())
        });
        let reachability = self
            .reachability
            .unwrap_or_else(|| Arc::new(ManualReachability::reachable()));

        let (wake_tx, wake_rx) = mpsc::channel(1);
        let (state_tx, _) = watch::channel(QueueState::Idle);

        let shared = Arc::new(Shared {
            store,
            handler,
            reachability,
            launch_delay: self.launch_delay,
            inner: Mutex::new(Inner {
                run_list: RunList::new(),
                in_flight: None,
                state: QueueState::Idle,
                launched: false,
                seeded: false,
                failure_pending: false,
            }),
            state_tx,
            wake_tx,
            resume_requested: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            stats: QueueStats::default(),
        });

        Ok(OfflineQueue {
            shared,
            wake_rx: parking_lot::Mutex::new(Some(wake_rx)),
            worker: parking_lot::Mutex::new(None),
            probe: None,
        })
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
