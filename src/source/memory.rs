//! In-Memory Data Source
//!
//! Process-local source of truth for the demo daemon and tests. Records
//! every loader call so coalescing can be observed.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::projection::{EntityId, Record};
use crate::source::DataSource;

/// One invocation of a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderCall {
    All,
    Assigned,
    Created,
    One(EntityId),
    Sections(EntityId, BTreeSet<String>),
}

#[derive(Debug, Default)]
pub struct InMemorySource {
    /// Owner/creator name that defines the assigned and created lists
    viewer: String,
    records: Mutex<BTreeMap<EntityId, Record>>,
    calls: Mutex<Vec<LoaderCall>>,
    /// Entities whose loads fail with a remote error
    failing: Mutex<HashSet<EntityId>>,
    latency: Mutex<Duration>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemorySource {
    pub fn new(viewer: impl Into<String>) -> Self {
        Self {
            viewer: viewer.into(),
            ..Self::default()
        }
    }

    pub fn with_records(self, records: impl IntoIterator<Item = Record>) -> Self {
        for record in records {
            self.upsert(record);
        }
        self
    }

    /// Simulated round-trip time applied to every load.
    pub fn with_latency(self, latency: Duration) -> Self {
        *locked(&self.latency) = latency;
        self
    }

    pub fn upsert(&self, record: Record) {
        locked(&self.records).insert(record.id, record);
    }

    pub fn remove(&self, id: EntityId) -> Option<Record> {
        locked(&self.records).remove(&id)
    }

    pub fn record(&self, id: EntityId) -> Option<Record> {
        locked(&self.records).get(&id).cloned()
    }

    pub fn fail_entity(&self, id: EntityId) {
        locked(&self.failing).insert(id);
    }

    pub fn heal_entity(&self, id: EntityId) {
        locked(&self.failing).remove(&id);
    }

    // == Call Inspection ==
    pub fn calls(&self) -> Vec<LoaderCall> {
        locked(&self.calls).clone()
    }

    pub fn count_calls(&self, call: &LoaderCall) -> usize {
        locked(&self.calls).iter().filter(|c| *c == call).count()
    }

    /// Entity-scoped calls (full or sections) made for `id`.
    pub fn entity_calls(&self, id: EntityId) -> Vec<LoaderCall> {
        locked(&self.calls)
            .iter()
            .filter(|c| matches!(c, LoaderCall::One(x) | LoaderCall::Sections(x, _) if *x == id))
            .cloned()
            .collect()
    }

    /// True when only entity loaders ran, never a list loader.
    pub fn no_list_calls(&self) -> bool {
        !locked(&self.calls)
            .iter()
            .any(|c| matches!(c, LoaderCall::All | LoaderCall::Assigned | LoaderCall::Created))
    }

    pub fn reset_calls(&self) {
        locked(&self.calls).clear();
    }

    async fn enter(&self, call: LoaderCall) {
        locked(&self.calls).push(call);
        let latency = *locked(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_failing(&self, id: EntityId) -> Result<()> {
        if locked(&self.failing).contains(&id) {
            return Err(SyncError::Remote(format!("entity {} unavailable", id)));
        }
        Ok(())
    }

    fn filtered(&self, keep: impl Fn(&Record) -> bool) -> Vec<Record> {
        locked(&self.records)
            .values()
            .filter(|r| keep(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn load_all_entities(&self) -> Result<Vec<Record>> {
        self.enter(LoaderCall::All).await;
        Ok(self.filtered(|_| true))
    }

    async fn load_assigned(&self) -> Result<Vec<Record>> {
        self.enter(LoaderCall::Assigned).await;
        Ok(self.filtered(|r| r.owner.as_deref() == Some(self.viewer.as_str())))
    }

    async fn load_created(&self) -> Result<Vec<Record>> {
        self.enter(LoaderCall::Created).await;
        Ok(self.filtered(|r| r.created_by.as_deref() == Some(self.viewer.as_str())))
    }

    async fn load_one_entity(&self, id: EntityId) -> Result<Record> {
        self.enter(LoaderCall::One(id)).await;
        self.check_failing(id)?;
        self.record(id)
            .ok_or_else(|| SyncError::NotFound(format!("entity {}", id)))
    }

    async fn load_entity_sections(
        &self,
        id: EntityId,
        sections: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, Value>> {
        self.enter(LoaderCall::Sections(id, sections.clone())).await;
        self.check_failing(id)?;
        let record = self
            .record(id)
            .ok_or_else(|| SyncError::NotFound(format!("entity {}", id)))?;
        Ok(record
            .sections
            .into_iter()
            .filter(|(name, _)| sections.contains(name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ListView;
    use serde_json::json;

    fn source() -> InMemorySource {
        InMemorySource::new("ana").with_records([
            Record::new(1, "Lease", "draft").with_owner("ana"),
            Record::new(2, "Invoice", "open").with_creator("ana"),
            Record::new(3, "Memo", "open")
                .with_owner("bo")
                .with_section("steps", json!(["a"]))
                .with_section("annexes", json!([])),
        ])
    }

    #[tokio::test]
    async fn test_list_loaders_filter_by_viewer() {
        let source = source();

        assert_eq!(source.load_list(ListView::All).await.unwrap().len(), 3);
        let assigned = source.load_assigned().await.unwrap();
        assert_eq!(assigned.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
        let created = source.load_created().await.unwrap();
        assert_eq!(created.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);

        assert_eq!(
            source.calls(),
            vec![LoaderCall::All, LoaderCall::Assigned, LoaderCall::Created]
        );
    }

    #[tokio::test]
    async fn test_sections_and_not_found() {
        let source = source();
        let wanted: BTreeSet<String> = ["steps".to_string()].into();

        let sections = source.load_entity_sections(3, &wanted).await.unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections["steps"], json!(["a"]));

        let missing = source.load_one_entity(99).await;
        assert!(matches!(missing, Err(SyncError::NotFound(_))));
        assert_eq!(source.entity_calls(3).len(), 1);
        assert!(source.no_list_calls());
    }

    #[tokio::test]
    async fn test_failing_entity() {
        let source = source();
        source.fail_entity(1);
        assert!(matches!(source.load_one_entity(1).await, Err(SyncError::Remote(_))));

        source.heal_entity(1);
        assert_eq!(source.load_one_entity(1).await.unwrap().title, "Lease");
    }
}
