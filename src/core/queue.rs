//! Scheduling queue ordered by arrival time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

/// Dequeue discipline for admitted tasks.
///
/// `YoungestFirst` keys each task by its negated arrival timestamp and pops
/// the smallest key, so the most recently arrived task runs next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    /// Most recently arrived task first.
    #[default]
    YoungestFirst,
    /// Earliest arrived task first (FIFO).
    OldestFirst,
}

impl QueueOrder {
    fn key(self, arrival_micros: u128) -> i128 {
        let arrival = i128::try_from(arrival_micros).unwrap_or(i128::MAX);
        match self {
            Self::YoungestFirst => -arrival,
            Self::OldestFirst => arrival,
        }
    }
}

/// Heap entry: smallest `(key, seq)` is popped first.
struct QueueEntry<T> {
    key: i128,
    seq: u64,
    item: T,
}

impl<T> PartialEq for QueueEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq
    }
}

impl<T> Eq for QueueEntry<T> {}

impl<T> PartialOrd for QueueEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueueEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the minimum key surfaces.
        (other.key, other.seq).cmp(&(self.key, self.seq))
    }
}

/// Holding area for admitted tasks that no worker has picked up yet.
///
/// Ties on the arrival key are broken by insertion order, so the pop order
/// is fully reproducible. Popping never blocks.
pub struct SchedulingQueue<T> {
    order: QueueOrder,
    next_seq: u64,
    entries: BinaryHeap<QueueEntry<T>>,
}

impl<T> SchedulingQueue<T> {
    /// Create an empty queue using the given discipline.
    #[must_use]
    pub const fn new(order: QueueOrder) -> Self {
        Self {
            order,
            next_seq: 0,
            entries: BinaryHeap::new(),
        }
    }

    /// Insert an item keyed by its arrival timestamp (microseconds).
    pub fn push(&mut self, item: T, arrival_micros: u128) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.push(QueueEntry {
            key: self.order.key(arrival_micros),
            seq,
            item,
        });
    }

    /// Remove the next item, or `None` if the queue is empty.
    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop().map(|entry| entry.item)
    }

    /// Remove every queued item in pop order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.entries.len());
        while let Some(item) = self.pop() {
            items.push(item);
        }
        items
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active dequeue discipline.
    #[must_use]
    pub const fn order(&self) -> QueueOrder {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youngest_first() {
        let mut q = SchedulingQueue::new(QueueOrder::YoungestFirst);
        q.push("t1", 100);
        q.push("t2", 200);
        q.push("t3", 300);

        assert_eq!(q.pop(), Some("t3"));
        assert_eq!(q.pop(), Some("t2"));
        assert_eq!(q.pop(), Some("t1"));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_youngest_first_independent_of_insert_order() {
        let mut q = SchedulingQueue::new(QueueOrder::YoungestFirst);
        q.push("mid", 200);
        q.push("old", 100);
        q.push("new", 300);

        assert_eq!(q.drain(), vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_oldest_first() {
        let mut q = SchedulingQueue::new(QueueOrder::OldestFirst);
        q.push("t2", 200);
        q.push("t1", 100);
        q.push("t3", 300);

        assert_eq!(q.drain(), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_ties_break_by_insertion() {
        for order in [QueueOrder::YoungestFirst, QueueOrder::OldestFirst] {
            let mut q = SchedulingQueue::new(order);
            q.push("a", 500);
            q.push("b", 500);
            q.push("c", 500);
            assert_eq!(q.drain(), vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn test_empty_queue() {
        let mut q = SchedulingQueue::<u8>::new(QueueOrder::default());
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert!(q.pop().is_none());
        assert_eq!(q.order(), QueueOrder::YoungestFirst);
    }
}
