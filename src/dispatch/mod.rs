//! Request routing onto the deferred-event scheduler.
//!
//! A [`Dispatcher`] resolves a path to a [`RequestHandler`], checks the
//! caller's role, and schedules a [`DispatchEvent`]. When the event comes due
//! its body spawns the handler under the shared concurrency limiter.

pub mod event;
pub mod handler;
pub mod router;

pub use event::DispatchEvent;
pub use handler::RequestHandler;
pub use router::Dispatcher;
