//! Counting gate that bounds how many deferred handler bodies run at once.
//!
//! The scheduler itself has no queue limit; this limiter is the only
//! backpressure between a burst of due events and the handlers they invoke.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::core::SchedulerError;

/// Default number of handler bodies allowed to run concurrently.
pub const DEFAULT_MAX_CONCURRENT: usize = 20;

/// Cloneable handle to a fixed-capacity permit counter.
///
/// Permits are returned when the [`LimiterPermit`] guard drops, so every exit
/// path of the holder (success, error, early return, panic) releases.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Scoped permit; dropping it releases the slot.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl LimiterPermit {
    /// Give the slot back now.
    pub fn release(self) {}
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` permits.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] when `capacity` is zero or
    /// exceeds what the underlying semaphore supports.
    pub fn new(capacity: usize) -> Result<Self, SchedulerError> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(SchedulerError::InvalidConfig(format!(
                "limiter capacity must be in 1..={}, got {capacity}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait until a permit is free and take it.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::LimiterClosed`] if the limiter was closed while
    /// waiting.
    pub async fn acquire(&self) -> Result<LimiterPermit, SchedulerError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::LimiterClosed)?;
        Ok(LimiterPermit { _permit: permit })
    }

    /// Take a permit only if one is free right now.
    #[must_use]
    pub fn try_acquire(&self) -> Option<LimiterPermit> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Some(LimiterPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => None,
        }
    }

    /// Stop handing out permits; pending and future acquires fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Whether [`ConcurrencyLimiter::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Permits currently held.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT)),
            capacity: DEFAULT_MAX_CONCURRENT,
        }
    }
}
