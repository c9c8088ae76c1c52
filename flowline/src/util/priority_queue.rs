//! Stable priority queue.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A min-priority queue which pulls same-key values in insertion order.
///
/// This is a binary heap whose items are sorted by the user-provided key and,
/// for equal keys, by a monotonically increasing insertion epoch. The epoch is
/// what makes simultaneous wake-ups resolve in the order they were scheduled.
pub(crate) struct PriorityQueue<K, V>
where
    K: Copy + Ord,
{
    heap: BinaryHeap<Reverse<Entry<K, V>>>,
    next_epoch: u64,
}

impl<K: Copy + Ord, V> PriorityQueue<K, V> {
    /// Creates an empty `PriorityQueue`.
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_epoch: 0,
        }
    }

    /// Returns the number of key-value pairs in the priority queue.
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Inserts a new key-value pair.
    ///
    /// This operation has *O*(log(*N*)) complexity.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        let epoch = self.next_epoch;
        assert_ne!(epoch, u64::MAX);
        self.next_epoch += 1;

        self.heap.push(Reverse(Entry { key, epoch, value }));
    }

    /// Pulls the value with the lowest key.
    ///
    /// If there are several equal lowest keys, the value which was inserted
    /// first is returned.
    pub(crate) fn pull(&mut self) -> Option<(K, V)> {
        self.heap
            .pop()
            .map(|Reverse(entry)| (entry.key, entry.value))
    }

    /// Pulls the value with the lowest key if that key is equal to `key`.
    pub(crate) fn pull_if_key(&mut self, key: K) -> Option<V> {
        if self.peek_key()? == key {
            self.pull().map(|(_, value)| value)
        } else {
            None
        }
    }

    /// Peeks at the lowest key currently in the queue.
    pub(crate) fn peek_key(&self) -> Option<K> {
        self.heap.peek().map(|Reverse(entry)| entry.key)
    }
}

struct Entry<K, V> {
    key: K,
    epoch: u64,
    value: V,
}

impl<K: Ord, V> PartialEq for Entry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.epoch == other.epoch
    }
}

impl<K: Ord, V> Eq for Entry<K, V> {}

impl<K: Ord, V> PartialOrd for Entry<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord, V> Ord for Entry<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.epoch.cmp(&other.epoch))
    }
}
