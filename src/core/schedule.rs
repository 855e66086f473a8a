//! Scheduled Notifications
//!
//! Deferred work keyed by simulation time.
//! Replaces wall-clock timers so the whole engine stays replayable.

use std::collections::BTreeMap;

use super::clock::Millis;

/// Queue of items that become due at a simulation timestamp.
///
/// Items due at the same time drain in insertion order.
#[derive(Clone, Debug)]
pub struct ScheduledQueue<T> {
    entries: BTreeMap<(Millis, u64), T>,
    next_seq: u64,
}

impl<T> Default for ScheduledQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ScheduledQueue<T> {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `item` to become due at `at`.
    pub fn schedule(&mut self, at: Millis, item: T) {
        self.entries.insert((at, self.next_seq), item);
        self.next_seq += 1;
    }

    /// Remove and return every item due at or before `now`.
    pub fn drain_due(&mut self, now: Millis) -> Vec<T> {
        let later = self.entries.split_off(&(now.saturating_add(1), 0));
        let due = std::mem::replace(&mut self.entries, later);
        due.into_values().collect()
    }

    /// Earliest pending due time.
    pub fn next_due(&self) -> Option<Millis> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_due_in_time_then_insertion_order() {
        let mut schedule = ScheduledQueue::new();
        schedule.schedule(300, "c");
        schedule.schedule(100, "a");
        schedule.schedule(100, "b");
        schedule.schedule(500, "d");

        assert_eq!(schedule.next_due(), Some(100));
        assert!(schedule.drain_due(99).is_empty());
        assert_eq!(schedule.drain_due(300), vec!["a", "b", "c"]);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.drain_due(u64::MAX), vec!["d"]);
        assert!(schedule.is_empty());
    }
}
