//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with creation-order eviction,
//! TTL expiration and a durable write-through mirror.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{
    CacheCounters, CacheEntry, CacheStats, CreationOrder, DurableStore, MAX_ENTRY_BYTES,
};
use crate::config::Config;
use crate::error::SyncError;
use crate::projection::EntityId;

// == Cache Config ==
/// Capacity, default TTL and mirror namespace of a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries allowed (at least 1)
    pub max_entries: usize,
    /// TTL applied when `set` gets none
    pub default_ttl: Duration,
    /// Namespace inside the durable store
    pub namespace: String,
}

impl CacheConfig {
    pub fn new(max_entries: usize, default_ttl: Duration, namespace: impl Into<String>) -> Self {
        Self {
            max_entries: max_entries.max(1),
            default_ttl,
            namespace: namespace.into(),
        }
    }
}

impl From<&Config> for CacheConfig {
    fn from(config: &Config) -> Self {
        Self::new(
            config.max_entries,
            config.default_ttl(),
            config.cache_namespace.clone(),
        )
    }
}

// == TTL Cache ==
/// Bounded-memory, bounded-staleness store for derived and query results.
///
/// Storage problems never reach the caller: they are counted in `errors` and
/// the operation degrades to a miss.
pub struct TtlCache {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Creation-order tracker for eviction
    order: CreationOrder,
    /// Performance counters
    counters: CacheCounters,
    config: CacheConfig,
    /// Write-through durable mirror
    mirror: Arc<dyn DurableStore>,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .field("counters", &self.counters)
            .finish()
    }
}

impl TtlCache {
    // == Constructor ==
    /// Creates an empty cache. The mirror is not read; see [`TtlCache::open`].
    pub fn new(config: CacheConfig, mirror: Arc<dyn DurableStore>) -> Self {
        Self {
            entries: HashMap::new(),
            order: CreationOrder::new(),
            counters: CacheCounters::new(),
            config,
            mirror,
        }
    }

    /// Creates a cache and restores unexpired entries from the mirror.
    pub fn open(config: CacheConfig, mirror: Arc<dyn DurableStore>) -> Self {
        let mut cache = Self::new(config, mirror);
        let restored = cache.rehydrate();
        debug!(restored, namespace = %cache.config.namespace, "Cache rehydrated");
        cache
    }

    // == Rehydrate ==
    /// Loads valid entries from the mirror. Unparseable or invalid entries are
    /// deleted; unreadable ones are counted as errors and left in place.
    ///
    /// Returns the number of entries restored.
    pub fn rehydrate(&mut self) -> usize {
        let namespace = self.config.namespace.clone();
        let keys = match self.mirror.list_keys(&namespace) {
            Ok(keys) => keys,
            Err(err) => {
                self.counters.record_error();
                warn!(error = %err, "Cache mirror listing failed");
                return 0;
            }
        };

        let now = current_timestamp_ms();
        let mut valid = Vec::new();
        for key in keys {
            let raw = match self.mirror.get(&namespace, &key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(err) => {
                    // Unreadable is not invalid: leave it for the next start
                    self.counters.record_error();
                    warn!(key = %key, error = %err, "Cache mirror read failed");
                    continue;
                }
            };
            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) if entry.validate(&key, now).is_none() => valid.push(entry),
                _ => self.mirror_delete(&key),
            }
        }

        // Keep the newest entries when the mirror outgrew the capacity
        valid.sort_by_key(|entry| entry.created_at);
        let overflow = valid.len().saturating_sub(self.config.max_entries);
        let stale: Vec<CacheEntry> = valid.drain(..overflow).collect();
        for entry in stale {
            self.mirror_delete(&entry.key);
        }

        let restored = valid.len();
        for entry in valid {
            self.insert_entry(entry);
        }
        restored
    }

    // == Set ==
    /// Stores a payload with an optional TTL (default TTL when `None`).
    ///
    /// An existing key is replaced wholesale with a fresh creation time. A new
    /// key at capacity first evicts the entry with the smallest creation time.
    /// Returns false when the entry was refused (counted as an error).
    pub fn set(&mut self, key: impl Into<String>, payload: Value, ttl: Option<Duration>) -> bool {
        let key = key.into();
        let entry = CacheEntry::new(key.clone(), payload, ttl.unwrap_or(self.config.default_ttl));

        if entry.size_bytes > MAX_ENTRY_BYTES {
            self.counters.record_error();
            warn!(key = %key, size = entry.size_bytes, "Cache entry exceeds size quota");
            return false;
        }

        if self.entries.contains_key(&key) {
            self.detach(&key);
        } else if self.entries.len() >= self.config.max_entries {
            if let Some(evicted) = self.order.evict_oldest() {
                self.remove_entry(&evicted);
                self.counters.record_eviction();
                debug!(key = %evicted, "Evicted oldest cache entry");
            }
        }

        self.mirror_write(&entry);
        self.insert_entry(entry);
        self.counters.record_set();
        true
    }

    /// Serializes `value` and stores it.
    pub fn set_as<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(payload) => self.set(key, payload, ttl),
            Err(err) => {
                self.counters.record_error();
                warn!(error = %err, "Cache payload serialization failed");
                false
            }
        }
    }

    // == Get ==
    /// Retrieves a payload by key.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        match self.lookup(key) {
            Some(payload) => {
                self.counters.record_hit();
                Some(payload)
            }
            None => {
                self.counters.record_miss();
                None
            }
        }
    }

    /// Retrieves and deserializes a payload. A payload of the wrong shape is
    /// counted as an error and reported as a miss.
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let Some(payload) = self.lookup(key) else {
            self.counters.record_miss();
            return None;
        };

        match serde_json::from_value(payload) {
            Ok(value) => {
                self.counters.record_hit();
                Some(value)
            }
            Err(err) => {
                self.counters.record_error();
                self.counters.record_miss();
                warn!(key = %key, error = %err, "Cached payload has unexpected shape");
                None
            }
        }
    }

    // == Delete ==
    /// Removes an entry from memory and the mirror. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.remove_entry(key).is_some() {
            self.counters.record_delete();
            true
        } else {
            false
        }
    }

    // == Invalidate By Pattern ==
    /// Deletes every key matching `pattern`; returns the count removed.
    pub fn invalidate_by_pattern(&mut self, pattern: &Regex) -> usize {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| pattern.is_match(key))
            .cloned()
            .collect();
        self.delete_all(keys)
    }

    // == Invalidate Referencing ==
    /// Deletes every entry that refers to `entity_id`, either as a delimited
    /// token in its key or as an `"id"` field anywhere in its payload.
    pub fn invalidate_referencing(&mut self, entity_id: EntityId) -> usize {
        let id = entity_id.to_string();
        let keys: Vec<String> = self
            .entries
            .values()
            .filter(|entry| {
                key_references(&entry.key, &id) || payload_references(&entry.payload, entity_id)
            })
            .map(|entry| entry.key.clone())
            .collect();
        self.delete_all(keys)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired_keys: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            self.remove_entry(&key);
        }
        count
    }

    // == Stats ==
    /// Returns a diagnostics snapshot.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }

    // == Length ==
    /// Returns the current number of entries, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entry access for diagnostics; does not touch counters or expiry.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Internals ==
    fn lookup(&mut self, key: &str) -> Option<Value> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.remove_entry(key);
            debug!(key = %key, "Lazily removed expired entry");
            return None;
        }
        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    fn delete_all(&mut self, keys: Vec<String>) -> usize {
        keys.iter().filter(|key| self.delete(key)).count()
    }

    fn insert_entry(&mut self, entry: CacheEntry) {
        self.order.record(&entry.key, entry.created_at);
        self.counters.add_bytes(entry.size_bytes);
        self.entries.insert(entry.key.clone(), entry);
    }

    /// Drops the in-memory entry only; the mirror is about to be overwritten.
    fn detach(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(key);
        self.counters.remove_bytes(entry.size_bytes);
        Some(entry)
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.detach(key)?;
        self.mirror_delete(key);
        Some(entry)
    }

    fn mirror_delete(&mut self, key: &str) {
        if let Err(err) = self.mirror.delete(&self.config.namespace, key) {
            self.counters.record_error();
            warn!(key = %key, error = %err, "Cache mirror delete failed");
        }
    }

    fn mirror_write(&mut self, entry: &CacheEntry) {
        let written = serde_json::to_string(entry)
            .map_err(SyncError::from)
            .and_then(|raw| self.mirror.set(&self.config.namespace, &entry.key, &raw));
        if let Err(err) = written {
            self.counters.record_error();
            warn!(key = %entry.key, error = %err, "Cache mirror write failed");
        }
    }
}

fn key_references(key: &str, id: &str) -> bool {
    key.split(|c: char| matches!(c, '_' | ':' | '/' | '-'))
        .any(|token| token == id)
}

fn payload_references(payload: &Value, entity_id: EntityId) -> bool {
    match payload {
        Value::Object(map) => {
            let id_matches = match map.get("id") {
                Some(Value::Number(n)) => n.as_u64() == Some(entity_id),
                Some(Value::String(s)) => s.parse::<EntityId>().ok() == Some(entity_id),
                _ => false,
            };
            id_matches || map.values().any(|v| payload_references(v, entity_id))
        }
        Value::Array(items) => items.iter().any(|v| payload_references(v, entity_id)),
        _ => false,
    }
}
