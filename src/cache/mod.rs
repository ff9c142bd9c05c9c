//! Cache Module
//!
//! Provides TTL caching of query results with oldest-first eviction and a
//! durable mirror that survives restarts.

mod entry;
mod order;
mod persistence;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use order::CreationOrder;
pub use persistence::{DurableStore, FileStore, MemoryStore};
pub use shared::SharedCache;
pub use stats::{format_bytes, CacheCounters, CacheStats};
pub use store::{CacheConfig, TtlCache};

// == Public Constants ==
/// Largest entry (key plus serialized payload) the cache accepts
pub const MAX_ENTRY_BYTES: usize = 1024 * 1024; // 1 MB
