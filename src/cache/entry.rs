//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
///
/// Entries are never mutated in place; a re-set builds a new entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    /// The key this entry is stored under
    pub key: String,
    /// The stored payload
    pub payload: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Approximate memory footprint of key and serialized payload
    pub size_bytes: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry that expires `ttl` from now.
    pub fn new(key: impl Into<String>, payload: Value, ttl: Duration) -> Self {
        let key = key.into();
        let now = current_timestamp_ms();
        let size_bytes = estimate_size(&key, &payload);

        Self {
            key,
            payload,
            created_at: now,
            expires_at: now.saturating_add(ttl.as_millis() as u64),
            size_bytes,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is readable iff `now < expires_at`, so it is expired as soon as
    /// the current time reaches the expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against an explicit clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }

    // == Validate ==
    /// Checks an entry read back from the durable mirror.
    ///
    /// Returns the reason the entry must be dropped, if any.
    pub fn validate(&self, expected_key: &str, now_ms: u64) -> Option<&'static str> {
        if self.key != expected_key {
            return Some("key mismatch");
        }
        if self.expires_at <= self.created_at {
            return Some("expiry precedes creation");
        }
        if self.is_expired_at(now_ms) {
            return Some("expired");
        }
        None
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn estimate_size(key: &str, payload: &Value) -> usize {
    // Value's Display writes compact JSON
    key.len() + payload.to_string().len()
}
