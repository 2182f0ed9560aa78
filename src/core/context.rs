//! Explicit dependency root handed to every component at construction.

use std::sync::Arc;
use std::time::Duration;

use crate::core::limiter::ConcurrencyLimiter;
use crate::core::registry::ModelRegistry;
use crate::core::scheduler::{Scheduler, SchedulerHandle};
use crate::core::session::SessionRegistry;
use crate::util::clock::{Clock, MonotonicClock};

/// Default delay between accepting a request and running its handler.
pub const DEFAULT_DISPATCH_DELAY: Duration = Duration::from_millis(250);

/// Shared collaborators of one scheduling core.
///
/// Cloning is cheap; every clone refers to the same scheduler, sessions,
/// limiter and model registry.
#[derive(Clone)]
pub struct ServiceContext {
    clock: Arc<dyn Clock>,
    scheduler: SchedulerHandle,
    sessions: Arc<SessionRegistry>,
    limiter: ConcurrencyLimiter,
    models: Arc<ModelRegistry>,
    dispatch_delay: Duration,
}

impl ServiceContext {
    /// Assemble a context from already-built parts.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        scheduler: SchedulerHandle,
        sessions: Arc<SessionRegistry>,
        limiter: ConcurrencyLimiter,
    ) -> Self {
        Self {
            clock,
            scheduler,
            sessions,
            limiter,
            models: Arc::new(ModelRegistry::new()),
            dispatch_delay: DEFAULT_DISPATCH_DELAY,
        }
    }

    /// Context with default parts sharing one clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let scheduler = SchedulerHandle::new(Scheduler::new(Arc::clone(&clock)));
        let sessions = Arc::new(SessionRegistry::new(Arc::clone(&clock)));
        Self::new(clock, scheduler, sessions, ConcurrencyLimiter::default())
    }

    /// Override the dispatch delay used by dispatchers built from this context.
    #[must_use]
    pub const fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = delay;
        self
    }

    /// Shared time source.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Shared scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Session store.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Handler concurrency limiter.
    #[must_use]
    pub const fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Additional collaborators looked up by type.
    #[must_use]
    pub const fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    /// Delay applied to dispatched requests.
    #[must_use]
    pub const fn dispatch_delay(&self) -> Duration {
        self.dispatch_delay
    }
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }
}
