//! Operation handler: the consumer-supplied execution callback and lifecycle hooks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::operation::{Opcode, Payload};

/// Result of executing one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Durable effects are complete; the record is deleted.
    Success,
    /// Cannot make progress now; the queue pauses and retries this record first.
    Retry,
    /// Will never succeed; the record is deleted without counting as a success.
    Discard,
}

impl From<bool> for ExecutionOutcome {
    fn from(success: bool) -> Self {
        if success {
            ExecutionOutcome::Success
        } else {
            ExecutionOutcome::Retry
        }
    }
}

/// Consumer hooks driven by the queue engine.
///
/// `execute` is never called concurrently with itself. Every hook runs on the
/// engine's worker task.
#[async_trait]
pub trait OperationHandler: Send + Sync + 'static {
    /// Execute one operation to completion.
    async fn execute(&self, opcode: Opcode, payload: Option<&Payload>) -> ExecutionOutcome;

    /// Called once the run list has been loaded, before the launch delay.
    async fn on_launch(&self) {}

    /// Called whenever a running queue pauses.
    async fn on_pause(&self) {}

    /// Gate consulted before leaving `Paused`.
    async fn should_resume(&self) -> bool {
        true
    }

    /// Called right before a paused queue starts running again.
    async fn on_resume(&self) {}
}

#[async_trait]
impl<H: OperationHandler + ?Sized> OperationHandler for Arc<H> {
    async fn execute(&self, opcode: Opcode, payload: Option<&Payload>) -> ExecutionOutcome {
        (**self).execute(opcode, payload).await
    }

    async fn on_launch(&self) {
        (**self).on_launch().await
    }

    async fn on_pause(&self) {
        (**self).on_pause().await
    }

    async fn should_resume(&self) -> bool {
        (**self).should_resume().await
    }

    async fn on_resume(&self) {
        (**self).on_resume().await
    }
}

type ExecuteFn = dyn Fn(Opcode, Option<Payload>) -> ExecutionOutcome + Send + Sync;
type HookFn = dyn Fn() + Send + Sync;
type GateFn = dyn Fn() -> bool + Send + Sync;

/// Handler assembled from closures.
///
/// The execute closure is synchronous and runs on tokio's blocking pool, so
/// it may block on network I/O.
pub struct FnHandler {
    execute: Arc<ExecuteFn>,
    on_launch: Option<Box<HookFn>>,
    on_pause: Option<Box<HookFn>>,
    should_resume: Option<Box<GateFn>>,
    on_resume: Option<Box<HookFn>>,
}

impl FnHandler {
    /// Wrap an execute closure. Its result converts into an outcome, so a
    /// plain `bool` works.
    pub fn new<F, R>(execute: F) -> Self
    where
        F: Fn(Opcode, Option<Payload>) -> R + Send + Sync + 'static,
        R: Into<ExecutionOutcome>,
    {
        Self {
            execute: Arc::new(move |opcode, payload| execute(opcode, payload).into()),
            on_launch: None,
            on_pause: None,
            should_resume: None,
            on_resume: None,
        }
    }

    /// Run `f` once the run list is loaded.
    pub fn with_on_launch(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_launch = Some(Box::new(f));
        self
    }

    /// Run `f` whenever the queue pauses.
    pub fn with_on_pause(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_pause = Some(Box::new(f));
        self
    }

    /// Gate resumes on `f`. Without it every resume is allowed.
    pub fn with_should_resume(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.should_resume = Some(Box::new(f));
        self
    }

    /// Run `f` right before a paused queue restarts.
    pub fn with_on_resume(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_resume = Some(Box::new(f));
        self
    }
}

#[async_trait]
impl OperationHandler for FnHandler {
    async fn execute(&self, opcode: Opcode, payload: Option<&Payload>) -> ExecutionOutcome {
        let execute = self.execute.clone();
        let payload = payload.cloned();
        match tokio::task::spawn_blocking(move || execute(opcode, payload)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // A panicking callback is retried like any other failure.
                error!("Operation handler for opcode {} panicked: {}", opcode, e);
                ExecutionOutcome::Retry
            }
        }
    }

    async fn on_launch(&self) {
        if let Some(f) = &self.on_launch {
            f();
        }
    }

    async fn on_pause(&self) {
        if let Some(f) = &self.on_pause {
            f();
        }
    }

    async fn should_resume(&self) -> bool {
        self.should_resume.as_ref().map_or(true, |f| f())
    }

    async fn on_resume(&self) {
        if let Some(f) = &self.on_resume {
            f();
        }
    }
}
