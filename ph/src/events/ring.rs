//! History Ring - bounded, most-recent-first retention of event records

use std::collections::VecDeque;

use tracing::debug;

use super::types::EventRecord;

/// Default number of retained records
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Bounded FIFO-evicting buffer of published events
///
/// Records are kept newest first. Appending at capacity evicts the oldest
/// record; there is no time-based expiry.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    records: VecDeque<EventRecord>,
    capacity: usize,
}

impl HistoryRing {
    /// Create an empty ring with a fixed capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "HistoryRing::new: called");
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a record at the front, evicting from the tail past capacity
    ///
    /// Returns the number of evicted records.
    pub fn append(&mut self, record: EventRecord) -> usize {
        self.records.push_front(record);
        let evicted = self.records.len().saturating_sub(self.capacity);
        if evicted > 0 {
            debug!(evicted, "HistoryRing::append: evicting oldest");
            self.records.truncate(self.capacity);
        }
        evicted
    }

    /// Copy of the retained records, most recent first
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Role;
    use chrono::Utc;
    use proptest::prelude::*;

    fn record(id: u64) -> EventRecord {
        EventRecord {
            id,
            timestamp: Utc::now(),
            role: Role::SystemNotice,
            text: format!("event {}", id),
        }
    }

    fn ids(ring: &HistoryRing) -> Vec<u64> {
        ring.snapshot().iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_empty_ring() {
        let ring = HistoryRing::default();
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), DEFAULT_HISTORY_CAPACITY);
        assert!(ring.snapshot().is_empty());
    }

    #[test]
    fn test_capacity_two_evicts_first() {
        let mut ring = HistoryRing::new(2);
        assert_eq!(ring.append(record(1)), 0);
        assert_eq!(ring.append(record(2)), 0);
        assert_eq!(ring.append(record(3)), 1);

        assert_eq!(ids(&ring), vec![3, 2]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut ring = HistoryRing::new(3);
        ring.append(record(1));

        let mut view = ring.snapshot();
        view.clear();
        view.push(record(99));

        assert_eq!(ids(&ring), vec![1]);
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut ring = HistoryRing::new(0);
        assert_eq!(ring.append(record(1)), 1);
        assert!(ring.is_empty());
    }

    proptest! {
        #[test]
        fn prop_len_is_min_of_count_and_capacity(count in 0usize..200, capacity in 1usize..64) {
            let mut ring = HistoryRing::new(capacity);
            for id in 1..=count as u64 {
                ring.append(record(id));
            }

            let ids = ids(&ring);
            prop_assert_eq!(ids.len(), count.min(capacity));
            prop_assert!(ids.windows(2).all(|w| w[0] > w[1]));
            if count > 0 {
                prop_assert_eq!(ids[0], count as u64);
            }
        }

        #[test]
        fn prop_overflow_evicts_exactly_the_oldest(capacity in 1usize..64) {
            let mut ring = HistoryRing::new(capacity);
            for id in 1..=capacity as u64 {
                ring.append(record(id));
            }
            let before = ids(&ring);

            prop_assert_eq!(ring.append(record(capacity as u64 + 1)), 1);

            let after = ids(&ring);
            prop_assert_eq!(after[0], capacity as u64 + 1);
            prop_assert_eq!(&after[1..], &before[..capacity - 1]);
            prop_assert!(!after.contains(&1));
        }
    }
}
