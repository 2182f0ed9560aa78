//! Deferred-event scheduling, pooled events, background task lifecycle,
//! concurrency limiting and sessions.

pub mod context;
pub mod error;
pub mod event;
pub mod heap_queue;
pub mod limiter;
pub mod managed_task;
pub mod pool;
pub mod pump;
pub mod registry;
pub mod scheduler;
pub mod session;

pub use context::{DEFAULT_DISPATCH_DELAY, ServiceContext};
pub use error::{AppResult, SchedulerError, is_cancellation};
pub use event::{Event, EventContext, Outcome};
pub use heap_queue::MinHeapQueue;
pub use limiter::{ConcurrencyLimiter, DEFAULT_MAX_CONCURRENT, LimiterPermit};
pub use managed_task::{
    DEFAULT_ERROR_BACKOFF, ManagedTask, TaskLoop, TaskState, sleep_or_cancel,
};
pub use pool::{DEFAULT_POOL_RESERVE, EventPool};
pub use pump::{DEFAULT_TICK_INTERVAL, SchedulerPump};
pub use registry::ModelRegistry;
pub use scheduler::{Scheduler, SchedulerHandle, TickReport};
pub use session::{
    DEFAULT_SESSION_TTL, DEFAULT_SWEEP_INTERVAL, SessionInfo, SessionRegistry, SessionSweeper,
};
