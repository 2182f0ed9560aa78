//! Builder assembling a scheduling core from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::CoreConfig;
use crate::core::{
    ConcurrencyLimiter, ManagedTask, Scheduler, SchedulerError, SchedulerHandle, SchedulerPump,
    ServiceContext, SessionRegistry, SessionSweeper,
};
use crate::dispatch::Dispatcher;
use crate::runtime::api::{self, CoreStatus, Health, TaskStatusSnapshot};
use crate::runtime::Spawn;
use crate::util::clock::{Clock, MonotonicClock};

/// Everything one scheduling core needs at run time.
///
/// Background tasks are built stopped; call [`CoreHandles::start`].
pub struct CoreHandles<S> {
    context: ServiceContext,
    pump: ManagedTask<SchedulerPump>,
    sweeper: ManagedTask<SessionSweeper>,
    spawner: S,
}

/// Build a core from `cfg` on a real monotonic clock.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidConfig`] when `cfg` fails validation.
pub fn build_core<S>(cfg: &CoreConfig, spawner: S) -> Result<CoreHandles<S>, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    build_core_with_clock(cfg, spawner, Arc::new(MonotonicClock::new()))
}

/// Build a core from `cfg` reading time from `clock`.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidConfig`] when `cfg` fails validation.
pub fn build_core_with_clock<S>(
    cfg: &CoreConfig,
    spawner: S,
    clock: Arc<dyn Clock>,
) -> Result<CoreHandles<S>, SchedulerError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let scheduler = SchedulerHandle::new(Scheduler::with_pool_reserve(
        Arc::clone(&clock),
        cfg.scheduler.pool_reserve,
    ));
    let sessions = Arc::new(SessionRegistry::with_default_ttl(
        Arc::clone(&clock),
        cfg.sessions.default_ttl(),
    ));
    let limiter = ConcurrencyLimiter::new(cfg.limiter.max_concurrent)?;

    let context = ServiceContext::new(clock, scheduler.clone(), Arc::clone(&sessions), limiter)
        .with_dispatch_delay(cfg.scheduler.dispatch_delay());

    let backoff = cfg.tasks.error_backoff();
    let pump = ManagedTask::new(
        SchedulerPump::new(scheduler, cfg.scheduler.tick_interval()).with_error_backoff(backoff),
    );
    let sweeper = ManagedTask::new(
        SessionSweeper::new(sessions, cfg.sessions.sweep_interval()).with_error_backoff(backoff),
    );

    info!(
        tick_interval_ms = cfg.scheduler.tick_interval_ms,
        max_concurrent = cfg.limiter.max_concurrent,
        "scheduling core built"
    );

    Ok(CoreHandles {
        context,
        pump,
        sweeper,
        spawner,
    })
}

impl<S> CoreHandles<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Shared collaborators.
    pub const fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Scheduler pump task.
    pub const fn pump(&self) -> &ManagedTask<SchedulerPump> {
        &self.pump
    }

    /// Session sweeper task.
    pub const fn sweeper(&self) -> &ManagedTask<SessionSweeper> {
        &self.sweeper
    }

    /// A dispatcher sharing this core's scheduler, sessions and limiter.
    #[must_use]
    pub fn dispatcher<R>(&self) -> Dispatcher<R, S>
    where
        R: Send + Sync + 'static,
    {
        Dispatcher::new(&self.context, self.spawner.clone())
    }

    /// Start the pump and the sweeper.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Backend`] when called outside a tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.pump.start()?;
        self.sweeper.start()?;
        Ok(())
    }

    /// Stop both background tasks.
    pub async fn stop(&self) {
        self.pump.stop().await;
        self.sweeper.stop().await;
    }

    /// Snapshot of queue, sessions, limiter and task states.
    #[must_use]
    pub fn status(&self) -> CoreStatus {
        let tasks = [
            TaskStatusSnapshot::of(&self.pump),
            TaskStatusSnapshot::of(&self.sweeper),
        ];
        api::status(&self.context, &tasks)
    }

    /// Liveness summary of [`CoreHandles::status`].
    #[must_use]
    pub fn health(&self) -> Health {
        api::health(&self.status())
    }
}
