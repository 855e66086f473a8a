//! Ordered Queue
//!
//! Double-ended FIFO/LIFO container.
//! Backs the per-rail pending event list and the clock's frame-rate window.

use std::collections::VecDeque;

/// Double-ended queue with O(1) push/pop at both ends.
///
/// Popping an empty queue yields `None`; there are no error conditions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderedQueue<T> {
    items: VecDeque<T>,
}

impl<T> Default for OrderedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Append to the back.
    #[inline]
    pub fn push_back(&mut self, value: T) {
        self.items.push_back(value);
    }

    /// Remove from the back.
    #[inline]
    pub fn pop_back(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Prepend to the front.
    #[inline]
    pub fn push_front(&mut self, value: T) {
        self.items.push_front(value);
    }

    /// Remove from the front.
    #[inline]
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Oldest element, if any.
    #[inline]
    pub fn peek_front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Newest element, if any.
    #[inline]
    pub fn peek_back(&self) -> Option<&T> {
        self.items.back()
    }

    /// Number of queued elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> OrderedQueue<T> {
    /// Snapshot in insertion order.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> FromIterator<T> for OrderedQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
