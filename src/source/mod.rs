//! Data Source Module
//!
//! The loaders the surrounding data layer injects into the sync core.

mod memory;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::projection::{EntityId, ListView, Record};

pub use memory::{InMemorySource, LoaderCall};

// == Data Source Trait ==
/// Source of truth for records. Implementations talk to the remote API.
///
/// A missing entity is reported as `SyncError::NotFound`.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load_all_entities(&self) -> Result<Vec<Record>>;

    /// Entities assigned to the viewer.
    async fn load_assigned(&self) -> Result<Vec<Record>>;

    /// Entities the viewer created.
    async fn load_created(&self) -> Result<Vec<Record>>;

    async fn load_one_entity(&self, id: EntityId) -> Result<Record>;

    /// Only the named sections of one entity.
    async fn load_entity_sections(
        &self,
        id: EntityId,
        sections: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, Value>>;

    /// Dispatches to the loader of a list view.
    async fn load_list(&self, view: ListView) -> Result<Vec<Record>> {
        match view {
            ListView::All => self.load_all_entities().await,
            ListView::Assigned => self.load_assigned().await,
            ListView::Created => self.load_created().await,
        }
    }
}
