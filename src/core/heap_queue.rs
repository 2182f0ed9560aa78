//! Binary min-heap backing the event queue.
//!
//! Unlike [`std::collections::BinaryHeap`] this heap is min-ordered, supports
//! removal by equality or predicate, and hands back the slot an item settled in
//! after a push so the caller can keep working with it in place.

use std::cmp::Ordering;

use crate::core::SchedulerError;

/// Binary min-heap ordered by `T: Ord`.
///
/// After every mutation each node compares less than or equal to its children,
/// so [`MinHeapQueue::peek`] is always the minimum.
#[derive(Debug, Clone)]
pub struct MinHeapQueue<T> {
    items: Vec<T>,
}

impl<T> Default for MinHeapQueue<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Ord> MinHeapQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Create an empty queue with room for `capacity` items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every queued item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// The minimum item, without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Iterate over queued items in heap (not sorted) order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Insert an item and return the index it settled at. O(log n).
    pub fn push(&mut self, item: T) -> usize {
        self.items.push(item);
        let last = self.items.len() - 1;
        self.sift_toward_root(last)
    }

    /// Remove and return the minimum item. O(log n).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::EmptyQueue`] when nothing is queued.
    pub fn pop(&mut self) -> Result<T, SchedulerError> {
        let last = self.items.pop().ok_or(SchedulerError::EmptyQueue)?;
        if self.items.is_empty() {
            return Ok(last);
        }
        let min = std::mem::replace(&mut self.items[0], last);
        self.sift_toward_leaves(0);
        Ok(min)
    }

    /// Whether an equal item is queued. O(n).
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.items.contains(item)
    }

    /// Remove the first item equal to `item`. O(n).
    ///
    /// Returns the removed item, or `None` when no equal item was queued.
    pub fn remove(&mut self, item: &T) -> Option<T>
    where
        T: PartialEq,
    {
        let index = self.items.iter().position(|queued| queued == item)?;
        Some(self.remove_at(index))
    }

    /// Remove every item matching `predicate` and restore heap order. O(n).
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        let (removed, kept): (Vec<T>, Vec<T>) =
            std::mem::take(&mut self.items).into_iter().partition(|item| predicate(item));
        self.items = kept;
        self.rebuild();
        removed
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    fn remove_at(&mut self, index: usize) -> T {
        let removed = self.items.swap_remove(index);
        if index < self.items.len() {
            let settled = self.sift_toward_root(index);
            if settled == index {
                self.sift_toward_leaves(index);
            }
        }
        removed
    }

    fn rebuild(&mut self) {
        for index in (0..self.items.len() / 2).rev() {
            self.sift_toward_leaves(index);
        }
    }

    /// Move the item at `pos` up while its parent compares greater.
    fn sift_toward_root(&mut self, mut pos: usize) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.items[parent].cmp(&self.items[pos]) != Ordering::Greater {
                break;
            }
            self.items.swap(parent, pos);
            pos = parent;
        }
        pos
    }

    /// Move the item at `pos` down, swapping with the smaller child.
    fn sift_toward_leaves(&mut self, mut pos: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.items[right] < self.items[left] {
                right
            } else {
                left
            };
            if self.items[pos] <= self.items[child] {
                break;
            }
            self.items.swap(pos, child);
            pos = child;
        }
    }
}
