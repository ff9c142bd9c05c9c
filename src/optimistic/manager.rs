//! Optimistic Update Manager
//!
//! Projects a tentative snapshot, awaits the mutation, then confirms with the
//! canonical record or rolls back by refetching from the source of truth.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::OptimisticTransaction;
use crate::cache::SharedCache;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::projection::{EntityId, Record, SharedProjection};
use crate::refresh::{RefreshCoordinator, ReloadScope};

const NOTICE_CAPACITY: usize = 64;

// == Notice ==
/// User-facing signal raised when a mutation does not go through.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Transient failure; the last reloaded state stays visible
    MutationFailed {
        entity_id: EntityId,
        message: String,
        at: DateTime<Utc>,
    },
    /// The entity no longer exists and was removed from view
    EntityRemoved {
        entity_id: EntityId,
        message: String,
        at: DateTime<Utc>,
    },
}

impl Notice {
    pub fn entity_id(&self) -> EntityId {
        match self {
            Notice::MutationFailed { entity_id, .. } | Notice::EntityRemoved { entity_id, .. } => {
                *entity_id
            }
        }
    }
}

// == Manager Config ==
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Queue updates to the same entity instead of letting the last write win
    pub serialize_same_entity: bool,
}

impl From<&Config> for ManagerConfig {
    fn from(config: &Config) -> Self {
        Self {
            serialize_same_entity: config.serialize_same_entity,
        }
    }
}

type EntityLocks = Mutex<HashMap<EntityId, Arc<tokio::sync::Mutex<()>>>>;

// == Optimistic Update Manager ==
pub struct OptimisticUpdateManager {
    projection: SharedProjection,
    coordinator: Arc<RefreshCoordinator>,
    cache: Option<SharedCache>,
    notices: broadcast::Sender<Notice>,
    /// Present only when same-entity updates are serialized
    entity_locks: Option<EntityLocks>,
}

impl OptimisticUpdateManager {
    /// Writes through the coordinator's projection; `cache` entries referring
    /// to a vanished entity are invalidated.
    pub fn new(
        config: ManagerConfig,
        coordinator: Arc<RefreshCoordinator>,
        cache: Option<SharedCache>,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            projection: coordinator.projection().clone(),
            coordinator,
            cache,
            notices,
            entity_locks: config.serialize_same_entity.then(Default::default),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    // == Optimistic Update ==
    /// Projects `tentative` (tagged provisional), awaits `operation`, then
    /// settles the projection.
    ///
    /// `operation` resolves to the canonical record when the remote returns
    /// one. Returns the confirmed record, or `None` when the entity no longer
    /// exists after the mutation. Mutation errors are returned after the
    /// rollback has been applied.
    pub async fn optimistic_update<F>(
        &self,
        entity_id: EntityId,
        tentative: Record,
        operation: F,
    ) -> Result<Option<Record>>
    where
        F: Future<Output = Result<Option<Record>>>,
    {
        let guard = self.acquire_entity(entity_id).await;

        let previous = self
            .projection
            .write()
            .await
            .project(tentative.clone(), true);
        let mut tx = OptimisticTransaction::begin(entity_id, tentative, previous);
        debug!(entity_id, "Tentative snapshot projected");

        let outcome = match operation.await {
            Ok(canonical) => self.confirm(&mut tx, canonical).await,
            Err(err) => Err(self.roll_back(&mut tx, err).await),
        };

        drop(guard);
        self.release_entity(entity_id);
        debug!(entity_id, status = ?tx.status(), "Optimistic transaction settled");
        outcome
    }

    async fn confirm(
        &self,
        tx: &mut OptimisticTransaction,
        canonical: Option<Record>,
    ) -> Result<Option<Record>> {
        let id = tx.entity_id;

        if let Some(record) = canonical {
            self.projection.write().await.project(record.clone(), false);
            tx.confirm();
            return Ok(Some(record));
        }

        match self.coordinator.reload_entity(id, ReloadScope::Full).await {
            Ok(_) => {
                tx.confirm();
                Ok(self.projection.read().await.get(id).map(|p| p.record))
            }
            Err(err) if err.is_not_found() => {
                // e.g. a delete: the mutation went through and the entity is gone
                self.forget_entity(id).await;
                tx.confirm();
                Ok(None)
            }
            Err(err) => {
                warn!(entity_id = id, error = %err, "Confirming reload failed, keeping tentative snapshot");
                self.projection.write().await.clear_provisional(id);
                tx.confirm();
                Ok(Some(tx.tentative.clone()))
            }
        }
    }

    async fn roll_back(&self, tx: &mut OptimisticTransaction, err: SyncError) -> SyncError {
        let id = tx.entity_id;
        tx.roll_back();

        if err.is_not_found() {
            self.forget_entity(id).await;
            self.notify(Notice::EntityRemoved {
                entity_id: id,
                message: err.to_string(),
                at: Utc::now(),
            });
            return err;
        }

        match self.coordinator.reload_entity(id, ReloadScope::Full).await {
            Ok(_) => debug!(entity_id = id, "Rolled back by refetch"),
            Err(reload_err) if reload_err.is_not_found() => self.forget_entity(id).await,
            Err(reload_err) => {
                warn!(entity_id = id, error = %reload_err, "Rollback refetch failed, restoring previous projection");
                let mut projection = self.projection.write().await;
                // A later write already replaced our snapshot and owns the entity now
                let still_ours = projection
                    .get(id)
                    .is_some_and(|p| p.provisional && p.record == tx.tentative);
                if still_ours {
                    projection.restore(id, tx.previous.take());
                }
            }
        }

        self.notify(Notice::MutationFailed {
            entity_id: id,
            message: err.to_string(),
            at: Utc::now(),
        });
        err
    }

    /// Drops a vanished entity from every projection and cached query.
    async fn forget_entity(&self, id: EntityId) {
        self.projection.write().await.remove_entity(id);
        if let Some(cache) = &self.cache {
            let removed = cache.invalidate_referencing(id).await;
            info!(entity_id = id, removed, "Entity removed from projections and cache");
        }
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine
        let _ = self.notices.send(notice);
    }

    // == Per-Entity Serialization ==
    async fn acquire_entity(&self, id: EntityId) -> Option<OwnedMutexGuard<()>> {
        let locks = self.entity_locks.as_ref()?;
        let lock = locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone();
        Some(lock.lock_owned().await)
    }

    fn release_entity(&self, id: EntityId) {
        if let Some(locks) = &self.entity_locks {
            let mut locks = locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the map holds it: nobody is waiting
            if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{ListView, ProjectionStore};
    use crate::refresh::CoordinatorConfig;
    use crate::source::InMemorySource;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn setup(serialize: bool) -> (OptimisticUpdateManager, Arc<InMemorySource>) {
        let source = Arc::new(
            InMemorySource::new("ana").with_records([Record::new(1, "Lease", "draft")]),
        );
        let coordinator = Arc::new(RefreshCoordinator::start(
            CoordinatorConfig::default(),
            source.clone(),
            ProjectionStore::shared(),
            None,
        ));
        coordinator.reload_list(ListView::All).await.unwrap();
        let config = ManagerConfig {
            serialize_same_entity: serialize,
        };
        (OptimisticUpdateManager::new(config, coordinator, None), source)
    }

    #[tokio::test]
    async fn test_canonical_result_is_projected() {
        let (manager, _) = setup(false).await;

        let result = manager
            .optimistic_update(1, Record::new(1, "Lease", "signing"), async {
                Ok(Some(Record::new(1, "Lease", "signed")))
            })
            .await
            .unwrap();

        assert_eq!(result.unwrap().status, "signed");
        let projection = manager.projection.read().await;
        assert_eq!(projection.get(1).unwrap().record.status, "signed");
        assert!(!projection.is_provisional(1));
    }

    #[tokio::test]
    async fn test_tentative_visible_while_pending() {
        let (manager, _) = setup(false).await;
        let projection = manager.projection.clone();

        let operation = async move {
            let seen = projection.read().await.get(1).unwrap();
            assert!(seen.provisional);
            assert_eq!(seen.record.status, "signing");
            Ok(Some(Record::new(1, "Lease", "signed")))
        };

        manager
            .optimistic_update(1, Record::new(1, "Lease", "signing"), operation)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failure_rolls_back_by_refetch() {
        let (manager, _) = setup(false).await;
        let mut notices = manager.subscribe();

        let result = manager
            .optimistic_update(1, Record::new(1, "Lease", "signing"), async {
                Err(SyncError::Remote("rejected".to_string()))
            })
            .await;

        assert!(matches!(result, Err(SyncError::Remote(_))));
        let projected = manager.projection.read().await.get(1).unwrap();
        assert_eq!(projected.record.status, "draft");
        assert!(!projected.provisional);
        assert!(matches!(notices.recv().await.unwrap(), Notice::MutationFailed { entity_id: 1, .. }));
    }

    #[tokio::test]
    async fn test_failed_refetch_restores_previous() {
        let (manager, source) = setup(false).await;
        source.fail_entity(1);

        let result = manager
            .optimistic_update(1, Record::new(1, "Lease", "signing"), async {
                Err(SyncError::Remote("rejected".to_string()))
            })
            .await;

        assert!(result.is_err());
        let projected = manager.projection.read().await.get(1).unwrap();
        assert_eq!(projected.record.status, "draft");
        assert!(!projected.provisional);
    }

    #[tokio::test]
    async fn test_interleaved_rollback_leaves_nothing_provisional() {
        let (manager, source) = setup(false).await;
        let (release_first, first_settles) = oneshot::channel::<()>();
        let (release_second, second_settles) = oneshot::channel::<()>();

        let first = manager.optimistic_update(1, Record::new(1, "Lease", "first-pending"), async {
            first_settles.await.ok();
            Ok(Some(Record::new(1, "Lease", "first")))
        });
        // Captures the first update's tentative snapshot as its previous
        let second = manager.optimistic_update(1, Record::new(1, "Lease", "second-pending"), async {
            second_settles.await.ok();
            Err(SyncError::Remote("rejected".to_string()))
        });
        let driver = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            release_first.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            // The rollback refetch fails too
            source.fail_entity(1);
            release_second.send(()).unwrap();
        };

        let (first, second, ()) = tokio::join!(first, second, driver);

        assert_eq!(first.unwrap().unwrap().status, "first");
        assert!(second.is_err());
        let projection = manager.projection.read().await;
        assert!(!projection.is_provisional(1));
        assert_eq!(projection.provisional_count(), 0);
        assert_eq!(projection.get(1).unwrap().record.status, "first");
    }

    #[tokio::test]
    async fn test_serialized_same_entity_updates() {
        let (manager, _) = setup(true).await;
        let manager = Arc::new(manager);

        let slow = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .optimistic_update(1, Record::new(1, "Lease", "first"), async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(Some(Record::new(1, "Lease", "first")))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fast = manager
            .optimistic_update(1, Record::new(1, "Lease", "second"), async {
                Ok(Some(Record::new(1, "Lease", "second")))
            })
            .await
            .unwrap();
        slow.await.unwrap().unwrap();

        // The second update waited for the first, so it is the last write
        assert_eq!(fast.unwrap().status, "second");
        assert_eq!(manager.projection.read().await.get(1).unwrap().record.status, "second");
        assert!(manager.entity_locks.as_ref().unwrap().lock().unwrap().is_empty());
    }
}
