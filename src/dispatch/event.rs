//! Scheduled event that runs a request handler under the concurrency limiter.

use std::sync::Arc;

use tracing::{error, warn};

use crate::core::{AppResult, ConcurrencyLimiter, Event, EventContext, Outcome};
use crate::dispatch::handler::RequestHandler;
use crate::runtime::Spawn;

pub(crate) struct DispatchJob<R: Send + Sync + 'static, S> {
    pub(crate) route: String,
    pub(crate) handler: Arc<dyn RequestHandler<R>>,
    pub(crate) request: R,
    pub(crate) limiter: ConcurrencyLimiter,
    pub(crate) spawner: S,
}

/// Pooled event carrying one accepted request until its handler runs.
///
/// When due, the body spawns the handler and returns immediately so the tick
/// is never blocked by request work. The spawned task holds a limiter permit
/// for the whole handler run.
pub struct DispatchEvent<R: Send + Sync + 'static, S> {
    job: Option<DispatchJob<R, S>>,
}

impl<R: Send + Sync + 'static, S> DispatchEvent<R, S> {
    pub(crate) fn load(&mut self, job: DispatchJob<R, S>) {
        self.job = Some(job);
    }

    /// Route of the carried request, if loaded.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.job.as_ref().map(|job| job.route.as_str())
    }
}

impl<R: Send + Sync + 'static, S> Default for DispatchEvent<R, S> {
    fn default() -> Self {
        Self { job: None }
    }
}

impl<R, S> Event for DispatchEvent<R, S>
where
    R: Send + Sync + 'static,
    S: Spawn + Send + 'static,
{
    fn precondition(&self) -> bool {
        self.job.is_some()
    }

    fn execute(&mut self, _ctx: &mut EventContext<'_>) -> AppResult<Outcome> {
        let Some(DispatchJob {
            route,
            handler,
            request,
            limiter,
            spawner,
        }) = self.job.take()
        else {
            return Ok(Outcome::Done);
        };

        spawner.spawn(async move {
            let permit = match limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(route = %route, "request dropped: {}", e);
                    return;
                }
            };
            if let Err(e) = handler.handle(&request).await {
                error!(route = %route, "handler failed: {:#}", e);
                handler.fail(&request, &e).await;
            }
            permit.release();
        });
        Ok(Outcome::Done)
    }

    fn cleanup(&mut self) {
        self.job = None;
    }
}
