//! Shared Cache Handle
//!
//! Async handle over a `TtlCache` shared between the coordinator, the
//! optimistic manager, the sweep task and the HTTP surface.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheStats, TtlCache};
use crate::error::Result;
use crate::projection::EntityId;

/// Cloneable handle; the lock is never held across a loader await.
#[derive(Clone, Debug)]
pub struct SharedCache {
    inner: Arc<RwLock<TtlCache>>,
}

impl SharedCache {
    pub fn new(cache: TtlCache) -> Self {
        Self {
            inner: Arc::new(RwLock::new(cache)),
        }
    }

    /// The underlying lock, for the background sweep.
    pub fn inner(&self) -> Arc<RwLock<TtlCache>> {
        self.inner.clone()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        // Write lock: lookups update counters and purge expired entries
        self.inner.write().await.get(key)
    }

    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inner.write().await.get_as(key)
    }

    pub async fn set(&self, key: impl Into<String>, payload: Value, ttl: Option<Duration>) -> bool {
        self.inner.write().await.set(key, payload, ttl)
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.inner.write().await.delete(key)
    }

    pub async fn invalidate_by_pattern(&self, pattern: &Regex) -> usize {
        self.inner.write().await.invalidate_by_pattern(pattern)
    }

    pub async fn invalidate_referencing(&self, entity_id: EntityId) -> usize {
        self.inner.write().await.invalidate_referencing(entity_id)
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.read().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    // == Get Or Load ==
    /// Returns the cached payload, or awaits `loader`, caches and returns its
    /// result. Loader errors propagate and nothing is cached.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        debug!(key = %key, "Cache miss, invoking loader");
        let loaded = loader().await?;
        self.set(key, loaded.clone(), ttl).await;
        Ok(loaded)
    }

    /// Typed variant of [`SharedCache::get_or_load`].
    pub async fn get_or_load_as<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get_as::<T>(key).await {
            return Ok(cached);
        }

        let loaded = loader().await?;
        self.inner.write().await.set_as(key, &loaded, ttl);
        Ok(loaded)
    }
}
