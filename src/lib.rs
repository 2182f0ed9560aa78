//! # Prometheus Event Scheduler
//!
//! Deferred-event scheduling core for request-serving processes.
//!
//! Request handlers do not run inline. Each accepted request is turned into a
//! pooled, time-ordered event; a background pump ticks the scheduler every few
//! milliseconds and runs whatever has come due, handing the real work to tokio
//! under a shared concurrency limit.
//!
//! ## Key Features
//!
//! - **Min-heap timeline**: events drain in due-time order, ties in arrival order
//! - **Event pooling**: retired events are cleaned and reused per concrete type
//! - **Managed tasks**: start/stop/restart lifecycle with error backoff for loops
//! - **Concurrency limiter**: bounded handler parallelism with scoped permits
//! - **Sessions**: TTL-bound session store with role checks and periodic sweeps
//! - **Explicit wiring**: one [`core::ServiceContext`] instead of global lookups
//!
//! ## Scheduling an event
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use prometheus_event_scheduler::core::{AppResult, Event, EventContext, Outcome};
//!
//! #[derive(Default)]
//! struct Notify {
//!     user: Option<String>,
//! }
//!
//! impl Event for Notify {
//!     fn precondition(&self) -> bool {
//!         self.user.is_some()
//!     }
//!
//!     fn execute(&mut self, _ctx: &mut EventContext<'_>) -> AppResult<Outcome> {
//!         tracing::info!("notifying {:?}", self.user);
//!         Ok(Outcome::Done)
//!     }
//!
//!     fn cleanup(&mut self) {
//!         self.user = None;
//!     }
//! }
//!
//! let core = build_core(&CoreConfig::default(), TokioSpawner::current()?)?;
//! core.start()?;
//! core.context()
//!     .scheduler()
//!     .schedule::<Notify>(Duration::from_millis(100))
//!     .user = Some("u1".into());
//! ```
//!
//! ## Dispatching requests
//!
//! ```rust,ignore
//! let dispatcher = core.dispatcher::<MyRequest>();
//! dispatcher.register(Arc::new(ProfileHandler));
//! dispatcher.dispatch_for_session("/api/profile", Some(&session_id), request)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduling, pooling, task lifecycle, limiter and sessions.
pub mod core;
/// Configuration models for the scheduler, limiter, sessions and tasks.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Request routing onto the scheduler.
pub mod dispatch;
/// Runtime adapters and status surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
