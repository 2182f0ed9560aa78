//! Runtime adapters and the serialisable status surface.

pub mod api;
pub mod tokio_spawner;

use std::future::Future;

pub use api::{CoreStatus, Health, TaskStatusSnapshot, health, status};
pub use tokio_spawner::TokioSpawner;

/// Abstraction over spawning detached async work.
pub trait Spawn {
    /// Spawn `fut` and let it run to completion in the background.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
