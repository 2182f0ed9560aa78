//! Background loop that drives [`Scheduler::tick`](crate::core::Scheduler::tick).

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::core::AppResult;
use crate::core::managed_task::{DEFAULT_ERROR_BACKOFF, TaskLoop};
use crate::core::scheduler::SchedulerHandle;

/// Default pause between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Ticks a shared scheduler on a fixed interval.
///
/// Run it under a [`ManagedTask`](crate::core::ManagedTask).
pub struct SchedulerPump {
    scheduler: SchedulerHandle,
    interval: Duration,
    error_backoff: Duration,
}

impl SchedulerPump {
    /// Tick `scheduler` every `interval`.
    #[must_use]
    pub const fn new(scheduler: SchedulerHandle, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }

    /// Override the pause after a failed iteration.
    #[must_use]
    pub const fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// The scheduler being driven.
    #[must_use]
    pub const fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}

#[async_trait]
impl TaskLoop for SchedulerPump {
    fn name(&self) -> &str {
        "scheduler-pump"
    }

    async fn iterate(&self, _token: &CancellationToken) -> AppResult<()> {
        let remaining = self.scheduler.tick();
        let report = self.scheduler.last_report();
        if report.executed + report.skipped + report.failed > 0 {
            trace!(
                executed = report.executed,
                skipped = report.skipped,
                failed = report.failed,
                remaining,
                "tick"
            );
        }
        Ok(())
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn error_backoff(&self) -> Duration {
        self.error_backoff
    }
}
