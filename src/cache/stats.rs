//! Cache Statistics Module
//!
//! Tracks cache performance metrics and produces read-only snapshots.

use serde::Serialize;

// == Cache Counters ==
/// Running counters owned by the cache. Not persisted.
#[derive(Debug, Clone, Default)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub evictions: u64,
    /// Sum of `size_bytes` over live entries
    pub total_bytes: usize,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn add_bytes(&mut self, bytes: usize) {
        self.total_bytes += bytes;
    }

    pub fn remove_bytes(&mut self, bytes: usize) {
        self.total_bytes = self.total_bytes.saturating_sub(bytes);
    }

    // == Snapshot ==
    /// Builds the diagnostics snapshot for the given entry count.
    pub fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            sets: self.sets,
            deletes: self.deletes,
            errors: self.errors,
            evictions: self.evictions,
            entries,
            hit_rate: hit_rate(self.hits, self.misses),
            total_bytes: self.total_bytes,
            total_size_formatted: format_bytes(self.total_bytes),
        }
    }
}

// == Cache Stats ==
/// Read-only diagnostics snapshot returned by `stats()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub evictions: u64,
    /// Current number of entries in the cache
    pub entries: usize,
    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_rate: f64,
    pub total_bytes: usize,
    pub total_size_formatted: String,
}

// == Hit Rate ==
fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

// == Format Bytes ==
/// Renders a byte count as `B`, `KB` or `MB` with one decimal above bytes.
pub fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let value = bytes as f64;
    if value < KB {
        format!("{} B", bytes)
    } else if value < MB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{:.1} MB", value / MB)
    }
}
