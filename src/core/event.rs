//! Deferred events and the context their bodies run in.

use std::any::{Any, TypeId};
use std::time::Duration;

use crate::core::AppResult;
use crate::core::scheduler::Timeline;

/// What the scheduler should do with an event after its body ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event is finished and goes back to its type's pool.
    Done,
    /// Requeue the same instance `delay` after the current clock reading.
    ///
    /// The instance keeps its payload and is not pooled. It runs again no
    /// earlier than the next tick.
    RescheduleAfter(Duration),
}

/// A pooled, identity-bearing unit of deferred work.
///
/// Implementors hold their payload in plain fields. The scheduler hands out
/// instances through [`Scheduler::schedule`](crate::core::Scheduler::schedule),
/// the caller fills the payload, and the body runs once the due time passes.
/// After retirement [`Event::cleanup`] must leave no payload behind: the same
/// instance will be handed to the next caller of that type.
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Expire {
///     key: Option<String>,
/// }
///
/// impl Event for Expire {
///     fn precondition(&self) -> bool {
///         self.key.is_some()
///     }
///
///     fn execute(&mut self, _ctx: &mut EventContext<'_>) -> AppResult<Outcome> {
///         tracing::info!("expiring {:?}", self.key);
///         Ok(Outcome::Done)
///     }
///
///     fn cleanup(&mut self) {
///         self.key = None;
///     }
/// }
/// ```
pub trait Event: Send + 'static {
    /// Re-check, at execution time, that the reasons for scheduling still hold.
    ///
    /// Returning `false` skips the body; the event is still retired.
    fn precondition(&self) -> bool {
        true
    }

    /// Run the event body.
    ///
    /// # Errors
    ///
    /// Any error is logged by the scheduler and the event is retired; it never
    /// interrupts the tick that ran it.
    fn execute(&mut self, ctx: &mut EventContext<'_>) -> AppResult<Outcome>;

    /// Clear payload before the instance returns to its pool.
    fn cleanup(&mut self) {}
}

/// Type-erased view of an [`Event`] used by the queue and the pools.
pub(crate) trait ErasedEvent: Event {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
    fn event_type(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
}

impl<T: Event> ErasedEvent for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn event_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Access to the scheduler from inside a running event body.
///
/// The popped event is owned by the tick while its body runs, so the body may
/// schedule further events without re-entering the scheduler lock.
pub struct EventContext<'a> {
    now: Duration,
    due: Duration,
    timeline: &'a mut Timeline,
}

impl<'a> EventContext<'a> {
    pub(crate) fn new(now: Duration, due: Duration, timeline: &'a mut Timeline) -> Self {
        Self { now, due, timeline }
    }

    /// Clock reading captured when the current tick began.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Due time the running event was popped with.
    #[must_use]
    pub const fn due(&self) -> Duration {
        self.due
    }

    /// How far past its due time the running event started.
    #[must_use]
    pub fn lateness(&self) -> Duration {
        self.now.saturating_sub(self.due)
    }

    /// Schedule another event `delay` after the tick's clock reading.
    ///
    /// The new event never runs in the tick that scheduled it, even with a
    /// zero delay; it waits for the next pass.
    pub fn schedule<T: Event + Default>(&mut self, delay: Duration) -> &mut T {
        self.timeline.schedule::<T>(self.now.saturating_add(delay))
    }

    /// Schedule another event and populate its payload in one step.
    pub fn schedule_with<T, F>(&mut self, delay: Duration, populate: F)
    where
        T: Event + Default,
        F: FnOnce(&mut T),
    {
        populate(self.schedule::<T>(delay));
    }
}
