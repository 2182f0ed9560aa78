//! Start/stop/restart lifecycle shared by every long-running subsystem.
//!
//! A [`TaskLoop`] supplies the loop body and hooks; [`ManagedTask`] owns the
//! cancellation token and the spawned tokio task driving it.
//!
//! ```text
//! Stopped --start()--> Starting --(loop begins)--> Started
//!    ^                                                |
//!    +------(loop exits)------ Stopping <---stop()----+
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::{AppResult, SchedulerError, is_cancellation};

/// Default pause after a failed iteration before the loop retries.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Lifecycle state of a [`ManagedTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// No loop is running.
    Stopped,
    /// Loop spawned but not yet entered.
    Starting,
    /// Loop is running.
    Started,
    /// Cancellation signalled; waiting for the loop to exit.
    Stopping,
}

/// Body and hooks of a background loop.
///
/// The default [`TaskLoop::run`] calls [`TaskLoop::iterate`] until the token is
/// cancelled, sleeping [`TaskLoop::interval`] between iterations. A failed or
/// panicking iteration is logged and followed by [`TaskLoop::error_backoff`];
/// only the cancellation error ends the loop.
#[async_trait]
pub trait TaskLoop: Send + Sync + 'static {
    /// Name used in logs and status snapshots.
    fn name(&self) -> &str;

    /// One pass of the loop body.
    ///
    /// # Errors
    ///
    /// Returning [`SchedulerError::OperationCanceled`] ends the loop; any other
    /// error is logged and retried after the backoff.
    async fn iterate(&self, token: &CancellationToken) -> AppResult<()>;

    /// Pause between successful iterations.
    fn interval(&self) -> Duration;

    /// Pause after a failed iteration.
    fn error_backoff(&self) -> Duration {
        DEFAULT_ERROR_BACKOFF
    }

    /// Full loop. Override only when the iterate/sleep shape does not fit.
    ///
    /// # Errors
    ///
    /// Ends with [`SchedulerError::OperationCanceled`] once `token` fires.
    async fn run(&self, token: CancellationToken) -> AppResult<()> {
        while !token.is_cancelled() {
            match AssertUnwindSafe(self.iterate(&token)).catch_unwind().await {
                Ok(Ok(())) => sleep_or_cancel(&token, self.interval()).await?,
                Ok(Err(e)) if is_cancellation(&e) => return Err(e),
                Ok(Err(e)) => {
                    error!(task = self.name(), "iteration failed: {:#}", e);
                    sleep_or_cancel(&token, self.error_backoff()).await?;
                }
                Err(_) => {
                    error!(task = self.name(), "iteration panicked");
                    sleep_or_cancel(&token, self.error_backoff()).await?;
                }
            }
        }
        Err(SchedulerError::OperationCanceled.into())
    }

    /// Called right after the loop has been spawned.
    fn on_started(&self) {}

    /// Called after cancellation is signalled, before waiting for the loop.
    fn on_stopping(&self) {}

    /// Called once the loop has exited.
    fn on_stopped(&self) {}
}

/// Sleep for `duration` unless `token` fires first.
///
/// # Errors
///
/// Returns [`SchedulerError::OperationCanceled`] when the token fires.
pub async fn sleep_or_cancel(
    token: &CancellationToken,
    duration: Duration,
) -> Result<(), SchedulerError> {
    tokio::select! {
        () = token.cancelled() => Err(SchedulerError::OperationCanceled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

struct RunHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Owns one background loop and its lifecycle.
pub struct ManagedTask<L: TaskLoop> {
    task_loop: Arc<L>,
    state: Arc<Mutex<TaskState>>,
    run: Mutex<Option<RunHandle>>,
}

impl<L: TaskLoop> ManagedTask<L> {
    /// Wrap a loop; nothing runs until [`ManagedTask::start`].
    pub fn new(task_loop: L) -> Self {
        Self::from_arc(Arc::new(task_loop))
    }

    /// Wrap a loop that is also referenced elsewhere.
    pub fn from_arc(task_loop: Arc<L>) -> Self {
        Self {
            task_loop,
            state: Arc::new(Mutex::new(TaskState::Stopped)),
            run: Mutex::new(None),
        }
    }

    /// Loop name.
    pub fn name(&self) -> &str {
        self.task_loop.name()
    }

    /// The wrapped loop.
    pub const fn task_loop(&self) -> &Arc<L> {
        &self.task_loop
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    /// Whether a loop is starting or running.
    pub fn is_running(&self) -> bool {
        matches!(self.state(), TaskState::Starting | TaskState::Started)
    }

    /// Spawn the loop on the current tokio runtime with a fresh token.
    ///
    /// Returns `Ok(false)` without doing anything unless the task is
    /// [`TaskState::Stopped`], including while a [`ManagedTask::stop`] is still
    /// waiting for the previous loop.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Backend`] when called outside a tokio runtime.
    pub fn start(&self) -> Result<bool, SchedulerError> {
        let mut run = self.run.lock();
        let state = self.state();
        if state != TaskState::Stopped {
            debug!(task = self.name(), ?state, "start ignored: not stopped");
            return Ok(false);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SchedulerError::Backend(format!("no tokio runtime: {e}")))?;

        *self.state.lock() = TaskState::Starting;
        let token = CancellationToken::new();
        let join = runtime.spawn(Self::drive(
            Arc::clone(&self.task_loop),
            Arc::clone(&self.state),
            token.clone(),
        ));
        // A loop that ended on its own leaves a finished handle behind.
        if let Some(stale) = run.replace(RunHandle { token, join }) {
            stale.token.cancel();
        }
        drop(run);

        self.task_loop.on_started();
        info!(task = self.name(), "task started");
        Ok(true)
    }

    async fn drive(task_loop: Arc<L>, state: Arc<Mutex<TaskState>>, token: CancellationToken) {
        {
            let mut state = state.lock();
            if *state == TaskState::Starting {
                *state = TaskState::Started;
            }
        }

        match AssertUnwindSafe(task_loop.run(token)).catch_unwind().await {
            Ok(Ok(())) => debug!(task = task_loop.name(), "loop returned"),
            Ok(Err(e)) if is_cancellation(&e) => debug!(task = task_loop.name(), "loop cancelled"),
            Ok(Err(e)) => error!(task = task_loop.name(), "loop exited with error: {:#}", e),
            Err(_) => error!(task = task_loop.name(), "loop panicked"),
        }

        // A loop that ends on its own goes straight back to Stopped.
        let mut state = state.lock();
        if matches!(*state, TaskState::Starting | TaskState::Started) {
            *state = TaskState::Stopped;
        }
    }

    /// Cancel the loop and wait for it to exit.
    ///
    /// Does nothing when already stopped.
    pub async fn stop(&self) {
        let Some(run) = self.run.lock().take() else {
            return;
        };
        run.token.cancel();
        {
            let mut state = self.state.lock();
            if *state == TaskState::Stopped {
                return;
            }
            *state = TaskState::Stopping;
        }

        self.task_loop.on_stopping();

        if let Err(e) = run.join.await {
            if e.is_cancelled() {
                debug!(task = self.name(), "loop task aborted");
            } else {
                error!(task = self.name(), "loop task panicked: {}", e);
            }
        }

        *self.state.lock() = TaskState::Stopped;
        self.task_loop.on_stopped();
        info!(task = self.name(), "task stopped");
    }

    /// Stop, then start again with a fresh token.
    ///
    /// # Errors
    ///
    /// See [`ManagedTask::start`].
    pub async fn restart(&self) -> Result<bool, SchedulerError> {
        self.stop().await;
        self.start()
    }
}

impl<L: TaskLoop> Drop for ManagedTask<L> {
    fn drop(&mut self) {
        if let Some(run) = self.run.get_mut().take() {
            run.token.cancel();
        }
    }
}
