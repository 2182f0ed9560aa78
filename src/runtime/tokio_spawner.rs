//! Tokio runtime spawner implementation.

use std::future::Future;
use std::sync::Arc;

use crate::core::SchedulerError;
use crate::runtime::Spawn;

/// Spawner that hands futures to a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: Arc<tokio::runtime::Handle>,
}

impl TokioSpawner {
    /// Spawn onto the runtime behind `handle`.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Spawn onto the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Backend`] when called outside a tokio runtime.
    pub fn current() -> Result<Self, SchedulerError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::Backend(format!("no tokio runtime: {e}")))
    }

    /// The runtime handle futures are spawned on.
    #[must_use]
    pub fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut);
    }
}
