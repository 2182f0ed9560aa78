//! Per-type free lists of retired events.

use std::any::TypeId;
use std::collections::HashMap;

use crate::core::SchedulerError;
use crate::core::event::{ErasedEvent, Event};

/// Initial capacity reserved for each type's free list.
pub const DEFAULT_POOL_RESERVE: usize = 4;

/// Stacks of reusable event instances keyed by concrete event type.
///
/// A pool is created the first time its type is acquired. Retired instances are
/// cleaned and pushed on top; acquisition pops the most recently retired one,
/// so allocation only happens when a type's stack is empty.
pub struct EventPool {
    pools: HashMap<TypeId, Vec<Box<dyn ErasedEvent>>>,
    reserve: usize,
}

impl EventPool {
    /// Create an empty pool set reserving `reserve` slots per type.
    #[must_use]
    pub fn new(reserve: usize) -> Self {
        Self {
            pools: HashMap::new(),
            reserve,
        }
    }

    /// Pop a retired `T` or construct a fresh one.
    pub fn acquire<T: Event + Default>(&mut self) -> Box<T> {
        let reserve = self.reserve;
        let stack = self
            .pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Vec::with_capacity(reserve));
        match stack.pop().map(|event| event.into_any()) {
            Some(any) => any.downcast::<T>().unwrap_or_else(|_| Box::default()),
            None => Box::default(),
        }
    }

    /// Clean `event` and return it to its type's stack.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownEventType`] (and drops the event) when
    /// `T` was never acquired or reserved through this pool.
    pub fn release<T: Event>(&mut self, event: Box<T>) -> Result<(), SchedulerError> {
        self.release_erased(event)
    }

    pub(crate) fn release_erased(
        &mut self,
        mut event: Box<dyn ErasedEvent>,
    ) -> Result<(), SchedulerError> {
        let Some(stack) = self.pools.get_mut(&event.event_type()) else {
            return Err(SchedulerError::UnknownEventType(
                event.type_name().to_string(),
            ));
        };
        event.cleanup();
        stack.push(event);
        Ok(())
    }

    /// Register `T` without acquiring an instance.
    pub fn reserve<T: Event>(&mut self) {
        let reserve = self.reserve;
        self.pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Vec::with_capacity(reserve));
    }

    /// Whether `T` has a pool.
    #[must_use]
    pub fn is_registered<T: Event>(&self) -> bool {
        self.pools.contains_key(&TypeId::of::<T>())
    }

    /// Number of idle `T` instances waiting for reuse.
    #[must_use]
    pub fn pooled<T: Event>(&self) -> usize {
        self.pools.get(&TypeId::of::<T>()).map_or(0, Vec::len)
    }

    /// Number of registered event types.
    #[must_use]
    pub fn registered_types(&self) -> usize {
        self.pools.len()
    }
}

impl Default for EventPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_RESERVE)
    }
}
