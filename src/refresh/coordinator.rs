//! Refresh Coordinator
//!
//! Accumulates refresh requests, waits for a quiet debounce window, then runs
//! the minimal reload set concurrently and broadcasts entity reload events.

use std::collections::BTreeSet;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::{
    requests_for, ActionKind, Debounce, RefreshContext, RefreshRequest, ReloadPlan, ReloadScope,
};
use crate::cache::SharedCache;
use crate::config::Config;
use crate::error::Result;
use crate::projection::{EntityId, ListView, SharedProjection};
use crate::source::DataSource;

const EVENT_CAPACITY: usize = 256;

// == Reload Event ==
/// Broadcast after each successful entity reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    pub entity_id: EntityId,
    /// Sections reloaded; empty for a full update
    pub updated_sections: Vec<String>,
    pub is_full_update: bool,
}

// == Drain Report ==
/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Requests taken from the queue
    pub requests: usize,
    /// Reload operations executed after coalescing
    pub operations: usize,
    pub failures: usize,
}

// == Coordinator Config ==
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub debounce: Duration,
    /// Cached query results dropped before any list view reloads
    pub list_cache_pattern: Option<Regex>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            list_cache_pattern: None,
        }
    }
}

impl From<&Config> for CoordinatorConfig {
    fn from(config: &Config) -> Self {
        Self {
            debounce: config.debounce(),
            ..Self::default()
        }
    }
}

struct Inner {
    pending: Mutex<Vec<RefreshRequest>>,
    debounce: Debounce,
    /// Drains run one at a time, whether timer-driven or flushed
    drain_lock: tokio::sync::Mutex<()>,
    source: Arc<dyn DataSource>,
    projection: SharedProjection,
    cache: Option<SharedCache>,
    list_cache_pattern: Option<Regex>,
    events: broadcast::Sender<ReloadEvent>,
}

// == Refresh Coordinator ==
/// Explicit instance: construct with [`RefreshCoordinator::start`], stop with
/// [`RefreshCoordinator::shutdown`]. Dropping it stops the worker.
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshCoordinator {
    // == Constructor ==
    /// Spawns the debounce worker. Must be called inside a tokio runtime.
    pub fn start(
        config: CoordinatorConfig,
        source: Arc<dyn DataSource>,
        projection: SharedProjection,
        cache: Option<SharedCache>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(Inner {
            pending: Mutex::new(Vec::new()),
            debounce: Debounce::new(config.debounce),
            drain_lock: tokio::sync::Mutex::new(()),
            source,
            projection,
            cache,
            list_cache_pattern: config.list_cache_pattern,
            events,
        });

        let worker_inner = inner.clone();
        let worker = tokio::spawn(async move {
            loop {
                worker_inner.debounce.settled().await;
                let report = worker_inner.drain().await;
                if report.requests > 0 {
                    debug!(
                        requests = report.requests,
                        operations = report.operations,
                        failures = report.failures,
                        "Refresh drain complete"
                    );
                }
            }
        });
        info!(debounce_ms = config.debounce.as_millis() as u64, "Refresh coordinator started");

        Self {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    // == Enqueue ==
    /// Queues a request and restarts the debounce timer. No I/O.
    pub fn enqueue(&self, request: RefreshRequest) {
        self.inner.pending_queue().push(request);
        self.inner.debounce.poke();
    }

    // == Smart Refresh ==
    /// Maps a write action to its reloads and queues them.
    ///
    /// Returns the number of requests queued.
    pub fn smart_refresh(&self, action: ActionKind, context: RefreshContext) -> usize {
        let requests = requests_for(&action, &context);
        let count = requests.len();
        debug!(action = %action, entity_id = ?context.entity_id, count, "Smart refresh");
        for request in requests {
            self.enqueue(request);
        }
        count
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending_queue().len()
    }

    /// Drains the queue now instead of waiting for the timer.
    pub async fn flush(&self) -> DrainReport {
        self.inner.drain().await
    }

    // == Direct Reloads ==
    /// Reloads one entity immediately, bypassing the queue.
    pub async fn reload_entity(&self, id: EntityId, scope: ReloadScope) -> Result<ReloadEvent> {
        self.inner.reload_entity(id, scope).await
    }

    /// Reloads one list view immediately, bypassing the queue.
    pub async fn reload_list(&self, view: ListView) -> Result<usize> {
        self.inner.reload_list(view).await
    }

    /// Subscribes to entity reload events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.inner.events.subscribe()
    }

    pub fn projection(&self) -> &SharedProjection {
        &self.inner.projection
    }

    // == Shutdown ==
    /// Drains what is still queued, then stops the worker.
    pub async fn shutdown(&self) {
        let report = self.flush().await;
        if let Some(worker) = self.take_worker() {
            worker.abort();
        }
        info!(drained = report.requests, "Refresh coordinator stopped");
    }

    fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for RefreshCoordinator {
    fn drop(&mut self) {
        if let Some(worker) = self.take_worker() {
            worker.abort();
        }
    }
}

impl Inner {
    fn pending_queue(&self) -> std::sync::MutexGuard<'_, Vec<RefreshRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Drain ==
    async fn drain(self: &Arc<Self>) -> DrainReport {
        let _running = self.drain_lock.lock().await;

        // Snapshot and clear in one step
        let batch = mem::take(&mut *self.pending_queue());
        if batch.is_empty() {
            return DrainReport::default();
        }

        let requests = batch.len();
        let plan = ReloadPlan::from_requests(batch);
        let mut report = DrainReport {
            requests,
            operations: plan.len(),
            failures: 0,
        };

        if !plan.lists.is_empty() {
            self.invalidate_list_queries().await;
        }

        let mut tasks = JoinSet::new();
        for view in plan.lists {
            let inner = self.clone();
            tasks.spawn(async move {
                inner
                    .reload_list(view)
                    .await
                    .map(|_| ())
                    .map_err(|err| (format!("list {}", view), err))
            });
        }
        for (id, scope) in plan.entities {
            let inner = self.clone();
            tasks.spawn(async move {
                inner
                    .reload_entity(id, scope)
                    .await
                    .map(|_| ())
                    .map_err(|err| (format!("entity {}", id), err))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err((target, err))) => {
                    report.failures += 1;
                    warn!(target = %target, error = %err, "Reload failed");
                }
                Err(err) => {
                    report.failures += 1;
                    warn!(error = %err, "Reload task aborted");
                }
            }
        }
        report
    }

    async fn invalidate_list_queries(&self) {
        if let (Some(cache), Some(pattern)) = (&self.cache, &self.list_cache_pattern) {
            let removed = cache.invalidate_by_pattern(pattern).await;
            debug!(removed, pattern = %pattern, "Invalidated cached list queries");
        }
    }

    // == Reloads ==
    async fn reload_list(&self, view: ListView) -> Result<usize> {
        let records = self.source.load_list(view).await?;
        let count = records.len();
        self.projection.write().await.replace_list(view, records);
        debug!(view = %view, count, "List view reloaded");
        Ok(count)
    }

    async fn reload_entity(&self, id: EntityId, scope: ReloadScope) -> Result<ReloadEvent> {
        let reloaded = match scope {
            ReloadScope::Full => self.reload_full(id).await,
            ReloadScope::Sections(names) => self.reload_sections(id, &names).await,
        };

        let event = match reloaded {
            Ok(event) => event,
            Err(err) => {
                if err.is_not_found() {
                    // Remote truth wins: the entity is gone
                    self.projection.write().await.remove_entity(id);
                    let removed = match &self.cache {
                        Some(cache) => cache.invalidate_referencing(id).await,
                        None => 0,
                    };
                    info!(entity_id = id, removed, "Entity no longer exists, removed from projections and cache");
                }
                return Err(err);
            }
        };

        // No subscribers is fine
        let _ = self.events.send(event.clone());
        Ok(event)
    }

    async fn reload_full(&self, id: EntityId) -> Result<ReloadEvent> {
        let record = self.source.load_one_entity(id).await?;
        self.projection.write().await.project(record, false);
        Ok(ReloadEvent {
            entity_id: id,
            updated_sections: Vec::new(),
            is_full_update: true,
        })
    }

    async fn reload_sections(&self, id: EntityId, names: &BTreeSet<String>) -> Result<ReloadEvent> {
        let sections = self.source.load_entity_sections(id, names).await?;
        let updated_sections = sections.keys().cloned().collect();
        self.projection.write().await.merge_sections(id, sections);
        Ok(ReloadEvent {
            entity_id: id,
            updated_sections,
            is_full_update: false,
        })
    }
}
