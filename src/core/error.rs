//! Error types for scheduler operations.

use thiserror::Error;

use crate::util::serde::Role;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Pop or peek on an empty queue.
    #[error("queue is empty")]
    EmptyQueue,
    /// An event was retired but its type never had a pool.
    #[error("no pool registered for event type {0}")]
    UnknownEventType(String),
    /// A managed task's loop observed cancellation.
    #[error("operation was canceled")]
    OperationCanceled,
    /// The concurrency limiter was closed while waiting for a permit.
    #[error("concurrency limiter closed")]
    LimiterClosed,
    /// No handler registered for a route.
    #[error("unknown route: {0}")]
    UnknownRoute(String),
    /// Caller's role is below the route's minimum role.
    #[error("access denied to {route} for role {role:?}")]
    AccessDenied {
        /// Route that was requested.
        route: String,
        /// Role the caller presented.
        role: Role,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl SchedulerError {
    /// Whether this error is the expected cancellation signal.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::OperationCanceled)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Whether an `anyhow` error wraps [`SchedulerError::OperationCanceled`].
#[must_use]
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SchedulerError>()
        .is_some_and(SchedulerError::is_canceled)
}
