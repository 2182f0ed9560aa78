//! Deferred-event scheduler: a clock, a min-heap of armed events, and the
//! per-type pools those events are recycled through.
//!
//! Request handlers call [`SchedulerHandle::schedule`] to obtain a pooled event,
//! fill its payload, and leave it queued. The scheduler pump calls
//! [`Scheduler::tick`] on a short interval; each tick drains every event whose
//! due time has passed, in non-decreasing due-time order, and retires finished
//! events to their pools.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::core::event::{ErasedEvent, Event, EventContext, Outcome};
use crate::core::heap_queue::MinHeapQueue;
use crate::core::pool::{DEFAULT_POOL_RESERVE, EventPool};
use crate::util::clock::Clock;

/// An armed event sitting in the queue.
struct Scheduled {
    due: Duration,
    seq: u64,
    event: Box<dyn ErasedEvent>,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier due first, then insertion order for equal due times.
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Queue and pools, split from the scheduler so event bodies can borrow them
/// while the tick holds the popped event.
pub(crate) struct Timeline {
    queue: MinHeapQueue<Scheduled>,
    pool: EventPool,
    next_seq: u64,
}

impl Timeline {
    fn new(pool_reserve: usize) -> Self {
        Self {
            queue: MinHeapQueue::new(),
            pool: EventPool::new(pool_reserve),
            next_seq: 0,
        }
    }

    fn arm(&mut self, due: Duration, event: Box<dyn ErasedEvent>) -> usize {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.queue.push(Scheduled { due, seq, event })
    }

    fn arm_typed<T: Event>(&mut self, due: Duration, event: Box<T>) -> &mut T {
        let slot = self.arm(due, event);
        match self
            .queue
            .get_mut(slot)
            .and_then(|entry| entry.event.as_any_mut().downcast_mut::<T>())
        {
            Some(event) => event,
            None => unreachable!("heap slot {slot} does not hold the event just armed"),
        }
    }

    pub(crate) fn schedule<T: Event + Default>(&mut self, due: Duration) -> &mut T {
        let event = self.pool.acquire::<T>();
        self.arm_typed(due, event)
    }

    /// Return a finished event to its pool, dropping it if its type has none.
    fn retire(&mut self, event: Box<dyn ErasedEvent>) -> bool {
        match self.pool.release_erased(event) {
            Ok(()) => true,
            Err(e) => {
                warn!("dropping retired event: {}", e);
                false
            }
        }
    }
}

/// Counters describing one [`Scheduler::tick`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Events whose body ran to completion.
    pub executed: usize,
    /// Events whose precondition failed.
    pub skipped: usize,
    /// Events whose body returned an error or panicked.
    pub failed: usize,
    /// Events that asked to run again.
    pub rescheduled: usize,
    /// Retired events dropped because their type had no pool.
    pub dropped: usize,
    /// Events still queued after the pass.
    pub remaining: usize,
}

type Observer = Box<dyn Fn(&dyn Any) + Send>;

/// Deferred-event scheduler.
///
/// Not internally synchronized; share it through [`SchedulerHandle`].
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    timeline: Timeline,
    observers: HashMap<TypeId, Vec<Observer>>,
    last_report: TickReport,
}

impl Scheduler {
    /// Create a scheduler reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_pool_reserve(clock, DEFAULT_POOL_RESERVE)
    }

    /// Create a scheduler reserving `pool_reserve` slots per event type.
    #[must_use]
    pub fn with_pool_reserve(clock: Arc<dyn Clock>, pool_reserve: usize) -> Self {
        Self {
            clock,
            timeline: Timeline::new(pool_reserve),
            observers: HashMap::new(),
            last_report: TickReport::default(),
        }
    }

    /// Current clock reading.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Take a `T` from its pool, arm it `delay` from now, and return it so the
    /// caller can fill in its payload.
    pub fn schedule<T: Event + Default>(&mut self, delay: Duration) -> &mut T {
        let due = self.clock.now().saturating_add(delay);
        self.timeline.schedule::<T>(due)
    }

    /// Arm an event the caller already owns, `delay` from now.
    ///
    /// If `T` never went through [`Scheduler::schedule`] it has no pool, and the
    /// instance is dropped (with a warning) when it retires.
    pub fn reschedule<T: Event>(&mut self, event: Box<T>, delay: Duration) -> &mut T {
        let due = self.clock.now().saturating_add(delay);
        self.timeline.arm_typed(due, event)
    }

    /// Remove queued `T` events matching `predicate` and retire them.
    ///
    /// Returns how many events were cancelled.
    pub fn cancel<T, F>(&mut self, predicate: F) -> usize
    where
        T: Event,
        F: Fn(&T) -> bool,
    {
        let cancelled = self.timeline.queue.remove_where(|entry| {
            entry
                .event
                .as_any()
                .downcast_ref::<T>()
                .is_some_and(&predicate)
        });
        let count = cancelled.len();
        for entry in cancelled {
            self.timeline.retire(entry.event);
        }
        count
    }

    /// Register a callback run after every successful `T` body.
    pub fn on_execute<T, F>(&mut self, observer: F)
    where
        T: Event,
        F: Fn(&T) + Send + 'static,
    {
        self.observers
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Box::new(move |any: &dyn Any| {
                if let Some(event) = any.downcast_ref::<T>() {
                    observer(event);
                }
            }));
    }

    /// Make sure `T` has a pool, so externally built instances can retire.
    pub fn register<T: Event>(&mut self) {
        self.timeline.pool.reserve::<T>();
    }

    /// Idle `T` instances available for reuse.
    #[must_use]
    pub fn pooled<T: Event>(&self) -> usize {
        self.timeline.pool.pooled::<T>()
    }

    /// Number of queued events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.timeline.queue.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timeline.queue.is_empty()
    }

    /// Due time of the earliest queued event.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.timeline.queue.peek().map(|entry| entry.due)
    }

    /// Retire every queued event to its pool without running it.
    ///
    /// Returns how many events were removed.
    pub fn clear(&mut self) -> usize {
        let drained = self.timeline.queue.remove_where(|_| true);
        let count = drained.len();
        for entry in drained {
            self.timeline.retire(entry.event);
        }
        count
    }

    /// Counters from the most recent tick.
    #[must_use]
    pub const fn last_report(&self) -> TickReport {
        self.last_report
    }

    /// Execute every event due at the current clock reading and return how
    /// many events remain queued.
    ///
    /// Faults in an event body or an [`Scheduler::on_execute`] observer
    /// (errors or panics) are logged and never escape. Only events armed before
    /// the tick began are drained: events scheduled from a body, and events
    /// that return [`Outcome::RescheduleAfter`], run no earlier than the next
    /// tick, so a single pass always terminates.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let horizon = self.timeline.next_seq;
        let mut report = TickReport::default();
        let mut requeue: Vec<(Duration, Box<dyn ErasedEvent>)> = Vec::new();

        // Entries armed during the drain are due no earlier than `now`, so the
        // first one reaching the top means nothing older is still due.
        while self
            .timeline
            .queue
            .peek()
            .is_some_and(|entry| entry.due <= now && entry.seq < horizon)
        {
            let Ok(Scheduled { due, mut event, .. }) = self.timeline.queue.pop() else {
                break;
            };

            let observers = self.observers.get(&event.event_type());
            let mut ctx = EventContext::new(now, due, &mut self.timeline);
            let run = catch_unwind(AssertUnwindSafe(|| {
                if !event.precondition() {
                    return None;
                }
                let result = event.execute(&mut ctx);
                if result.is_ok() {
                    for observer in observers.into_iter().flatten() {
                        observer(event.as_any());
                    }
                }
                Some(result)
            }));

            let outcome = match run {
                Ok(Some(Ok(outcome))) => {
                    report.executed += 1;
                    outcome
                }
                Ok(Some(Err(e))) => {
                    report.failed += 1;
                    error!("event {} failed: {:#}", event.type_name(), e);
                    Outcome::Done
                }
                Ok(None) => {
                    report.skipped += 1;
                    debug!("event {} precondition failed", event.type_name());
                    Outcome::Done
                }
                Err(_) => {
                    report.failed += 1;
                    error!("event {} panicked", event.type_name());
                    Outcome::Done
                }
            };

            match outcome {
                Outcome::RescheduleAfter(delay) => {
                    report.rescheduled += 1;
                    requeue.push((self.clock.now().saturating_add(delay), event));
                }
                Outcome::Done => {
                    if !self.timeline.retire(event) {
                        report.dropped += 1;
                    }
                }
            }
        }

        for (due, event) in requeue {
            self.timeline.arm(due, event);
        }

        report.remaining = self.timeline.queue.len();
        self.last_report = report;
        report.remaining
    }
}

/// Cloneable, lock-guarded handle shared by request handlers and the pump.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Arc<Mutex<Scheduler>>,
}

impl SchedulerHandle {
    /// Wrap a scheduler for shared use.
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(scheduler)),
        }
    }

    /// Schedule a `T` and hold the scheduler lock while its payload is filled.
    ///
    /// The pump cannot tick until the returned guard is dropped, so the event
    /// never runs half-populated.
    pub fn schedule<T: Event + Default>(&self, delay: Duration) -> MappedMutexGuard<'_, T> {
        MutexGuard::map(self.inner.lock(), |scheduler| scheduler.schedule::<T>(delay))
    }

    /// Schedule a `T` and populate it in one step.
    pub fn schedule_with<T, F>(&self, delay: Duration, populate: F)
    where
        T: Event + Default,
        F: FnOnce(&mut T),
    {
        populate(self.inner.lock().schedule::<T>(delay));
    }

    /// See [`Scheduler::reschedule`].
    pub fn reschedule<T: Event>(&self, event: Box<T>, delay: Duration) {
        self.inner.lock().reschedule(event, delay);
    }

    /// See [`Scheduler::cancel`].
    pub fn cancel<T, F>(&self, predicate: F) -> usize
    where
        T: Event,
        F: Fn(&T) -> bool,
    {
        self.inner.lock().cancel(predicate)
    }

    /// See [`Scheduler::tick`].
    pub fn tick(&self) -> usize {
        self.inner.lock().tick()
    }

    /// See [`Scheduler::pending`].
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().pending()
    }

    /// See [`Scheduler::last_report`].
    #[must_use]
    pub fn last_report(&self) -> TickReport {
        self.inner.lock().last_report()
    }

    /// See [`Scheduler::clear`].
    pub fn clear(&self) -> usize {
        self.inner.lock().clear()
    }

    /// Run `f` with exclusive access to the scheduler.
    pub fn with<R>(&self, f: impl FnOnce(&mut Scheduler) -> R) -> R {
        f(&mut *self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AppResult;
    use crate::util::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[derive(Default)]
    struct Record {
        label: u32,
        log: Option<Arc<Mutex<Vec<u32>>>>,
    }

    impl Event for Record {
        fn precondition(&self) -> bool {
            self.log.is_some()
        }

        fn execute(&mut self, _ctx: &mut EventContext<'_>) -> AppResult<Outcome> {
            if let Some(log) = &self.log {
                log.lock().push(self.label);
            }
            Ok(Outcome::Done)
        }

        fn cleanup(&mut self) {
            self.label = 0;
            self.log = None;
        }
    }

    #[derive(Default)]
    struct Repeat {
        remaining: u32,
        runs: Option<Arc<AtomicUsize>>,
    }

    impl Event for Repeat {
        fn execute(&mut self, _ctx: &mut EventContext<'_>) -> AppResult<Outcome> {
            if let Some(runs) = &self.runs {
                runs.fetch_add(1, AtomicOrdering::SeqCst);
            }
            if self.remaining == 0 {
                return Ok(Outcome::Done);
            }
            self.remaining -= 1;
            Ok(Outcome::RescheduleAfter(Duration::from_millis(100)))
        }

        fn cleanup(&mut self) {
            self.remaining = 0;
            self.runs = None;
        }
    }

    #[derive(Default)]
    struct Faulty {
        panic: bool,
    }

    impl Event for Faulty {
        fn execute(&mut self, _ctx: &mut EventContext<'_>) -> AppResult<Outcome> {
            if self.panic {
                panic!("boom");
            }
            anyhow::bail!("handler failed")
        }
    }

    #[derive(Default)]
    struct Chain {
        log: Option<Arc<Mutex<Vec<u32>>>>,
    }

    impl Event for Chain {
        fn execute(&mut self, ctx: &mut EventContext<'_>) -> AppResult<Outcome> {
            let log = self.log.clone();
            ctx.schedule_with::<Record, _>(Duration::ZERO, |r| {
                r.label = 99;
                r.log = log;
            });
            Ok(Outcome::Done)
        }
    }

    fn setup() -> (Arc<ManualClock>, Scheduler) {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::new(clock.clone());
        (clock, scheduler)
    }

    #[test]
    fn test_tick_drains_in_due_order() {
        let (clock, mut scheduler) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (label, delay_ms) in [(3, 30), (1, 10), (2, 20)] {
            let ev = scheduler.schedule::<Record>(Duration::from_millis(delay_ms));
            ev.label = label;
            ev.log = Some(log.clone());
        }

        assert_eq!(scheduler.tick(), 3, "nothing due yet");
        clock.advance(Duration::from_millis(50));
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(*log.lock(), vec![1, 2, 3]);
        assert_eq!(scheduler.pooled::<Record>(), 3);
        assert_eq!(scheduler.last_report().executed, 3);
    }

    #[test]
    fn test_only_due_events_run() {
        let (clock, mut scheduler) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (label, delay_ms) in [(1, 10), (2, 500)] {
            let ev = scheduler.schedule::<Record>(Duration::from_millis(delay_ms));
            ev.label = label;
            ev.log = Some(log.clone());
        }
        clock.advance(Duration::from_millis(100));
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(scheduler.next_due(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_failed_precondition_still_pooled() {
        let (clock, mut scheduler) = setup();
        scheduler.schedule::<Record>(Duration::ZERO);
        clock.advance(Duration::from_millis(1));
        scheduler.tick();
        let report = scheduler.last_report();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.executed, 0);
        assert_eq!(scheduler.pooled::<Record>(), 1);
    }

    #[test]
    fn test_self_reschedule_not_pooled() {
        let (clock, mut scheduler) = setup();
        let runs = Arc::new(AtomicUsize::new(0));
        {
            let ev = scheduler.schedule::<Repeat>(Duration::ZERO);
            ev.remaining = 1;
            ev.runs = Some(runs.clone());
        }

        assert_eq!(scheduler.tick(), 1, "rescheduled instance stays queued");
        assert_eq!(scheduler.pooled::<Repeat>(), 0);
        assert_eq!(scheduler.last_report().rescheduled, 1);

        // Not due again within the same clock reading.
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 1);

        clock.advance(Duration::from_millis(100));
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(scheduler.pooled::<Repeat>(), 1);
    }

    #[test]
    fn test_faults_do_not_stop_tick() {
        let (clock, mut scheduler) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        scheduler.schedule::<Faulty>(Duration::ZERO);
        scheduler.schedule::<Faulty>(Duration::ZERO).panic = true;
        {
            let ev = scheduler.schedule::<Record>(Duration::from_millis(1));
            ev.label = 5;
            ev.log = Some(log.clone());
        }
        clock.advance(Duration::from_millis(5));
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(scheduler.last_report().failed, 2);
        assert_eq!(*log.lock(), vec![5]);
        assert_eq!(scheduler.pooled::<Faulty>(), 2);
    }

    #[test]
    fn test_unregistered_event_is_dropped() {
        let (clock, mut scheduler) = setup();
        scheduler.reschedule(Box::new(Faulty::default()), Duration::ZERO);
        clock.advance(Duration::from_millis(1));
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(scheduler.last_report().dropped, 1);
        assert_eq!(scheduler.pooled::<Faulty>(), 0);
    }

    #[test]
    fn test_registered_external_event_is_pooled() {
        let (_clock, mut scheduler) = setup();
        scheduler.register::<Faulty>();
        scheduler.reschedule(Box::new(Faulty::default()), Duration::ZERO);
        scheduler.tick();
        assert_eq!(scheduler.last_report().dropped, 0);
        assert_eq!(scheduler.pooled::<Faulty>(), 1);
    }

    #[test]
    fn test_body_can_schedule_more_events() {
        let (_clock, mut scheduler) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        scheduler.schedule::<Chain>(Duration::ZERO).log = Some(log.clone());
        assert_eq!(scheduler.tick(), 1, "chained event waits for the next tick");
        assert!(log.lock().is_empty());
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(*log.lock(), vec![99]);
    }

    #[test]
    fn test_panicking_observer_is_contained() {
        let (_clock, mut scheduler) = setup();
        scheduler.on_execute::<Record, _>(|r| assert!(r.label != 1, "bad label"));
        let log = Arc::new(Mutex::new(Vec::new()));
        for label in [1, 2] {
            let ev = scheduler.schedule::<Record>(Duration::ZERO);
            ev.label = label;
            ev.log = Some(log.clone());
        }
        {
            let ev = scheduler.schedule::<Repeat>(Duration::ZERO);
            ev.remaining = 1;
        }

        assert_eq!(scheduler.tick(), 1, "requeued repeat survives the panic");
        let report = scheduler.last_report();
        assert_eq!(report.failed, 1);
        assert_eq!(report.executed, 2);
        assert_eq!(report.rescheduled, 1);
        assert_eq!(*log.lock(), vec![1, 2]);
        assert_eq!(scheduler.pooled::<Record>(), 2);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let (clock, mut scheduler) = setup();
        clock.advance(Duration::from_secs(5));
        scheduler.schedule::<Record>(Duration::MAX);
        scheduler.reschedule(Box::new(Faulty::default()), Duration::MAX);
        assert_eq!(scheduler.next_due(), Some(Duration::MAX));
        assert_eq!(scheduler.tick(), 2);
    }

    #[test]
    fn test_clear_retires_to_pools() {
        let (_clock, mut scheduler) = setup();
        for label in 1..=3 {
            scheduler.schedule::<Record>(Duration::from_secs(1)).label = label;
        }
        assert_eq!(scheduler.clear(), 3);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.pooled::<Record>(), 3);
    }

    #[test]
    fn test_cancel_retires_matching_events() {
        let (_clock, mut scheduler) = setup();
        for label in 1..=4 {
            scheduler.schedule::<Record>(Duration::from_secs(1)).label = label;
        }
        let cancelled = scheduler.cancel::<Record, _>(|r| r.label % 2 == 0);
        assert_eq!(cancelled, 2);
        assert_eq!(scheduler.pending(), 2);
        assert_eq!(scheduler.pooled::<Record>(), 2);
    }

    #[test]
    fn test_on_execute_observer() {
        let (_clock, mut scheduler) = setup();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        scheduler.on_execute::<Record, _>(move |r| {
            counter.fetch_add(r.label as usize, AtomicOrdering::SeqCst);
        });
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let ev = scheduler.schedule::<Record>(Duration::ZERO);
            ev.label = 4;
            ev.log = Some(log);
        }
        scheduler.tick();
        assert_eq!(seen.load(AtomicOrdering::SeqCst), 4);
    }

    #[test]
    fn test_handle_guard_populates_before_tick() {
        let clock = Arc::new(ManualClock::new());
        let handle = SchedulerHandle::new(Scheduler::new(clock));
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut ev = handle.schedule::<Record>(Duration::ZERO);
            ev.label = 8;
            ev.log = Some(log.clone());
        }
        assert_eq!(handle.pending(), 1);
        assert_eq!(handle.tick(), 0);
        assert_eq!(*log.lock(), vec![8]);
    }
}
