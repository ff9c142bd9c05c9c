//! Creation Order Module
//!
//! Tracks entries by creation time for oldest-first eviction.

use std::collections::{BTreeMap, HashMap};

// == Creation Order ==
/// Tracks creation order for the eviction strategy.
///
/// Ordering key is `(created_at, seq)`: the sequence number breaks ties between
/// entries created within the same millisecond. Reads never reorder entries,
/// so this is not an LRU.
#[derive(Debug, Default)]
pub struct CreationOrder {
    /// Keys ordered oldest first
    order: BTreeMap<(u64, u64), String>,
    /// Reverse index for O(log n) removal
    positions: HashMap<String, (u64, u64)>,
    /// Next tie-break sequence number
    next_seq: u64,
}

impl CreationOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record ==
    /// Records `key` as created at `created_at`, replacing any earlier record.
    pub fn record(&mut self, key: &str, created_at: u64) {
        self.remove(key);
        let position = (created_at, self.next_seq);
        self.next_seq += 1;
        self.order.insert(position, key.to_string());
        self.positions.insert(key.to_string(), position);
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(position) = self.positions.remove(key) {
            self.order.remove(&position);
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the key with the smallest creation time.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.positions.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    /// Returns the oldest key without removing it.
    pub fn peek_oldest(&self) -> Option<&String> {
        self.order.values().next()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
        self.positions.clear();
    }
}
