//! Projection Store
//!
//! Shared entity-list state written by reloads and optimistic updates.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use super::{EntityId, ListView, Projected, Record};

/// Shared handle; writers hold the lock only for in-memory updates.
pub type SharedProjection = Arc<RwLock<ProjectionStore>>;

// == Projection Store ==
/// List views plus detail projections.
///
/// The same entity may appear in several lists and in `details`; every write
/// for an id is applied to all of its copies.
#[derive(Debug, Default)]
pub struct ProjectionStore {
    lists: HashMap<ListView, Vec<Projected>>,
    details: BTreeMap<EntityId, Projected>,
}

impl ProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedProjection {
        Arc::new(RwLock::new(Self::new()))
    }

    // == Lists ==
    /// Replaces a list view wholesale with confirmed records.
    pub fn replace_list(&mut self, view: ListView, records: Vec<Record>) {
        for record in &records {
            if let Some(detail) = self.details.get_mut(&record.id) {
                *detail = Projected::confirmed(record.clone());
            }
        }
        self.lists
            .insert(view, records.into_iter().map(Projected::confirmed).collect());
    }

    pub fn list(&self, view: ListView) -> Vec<Projected> {
        self.lists.get(&view).cloned().unwrap_or_default()
    }

    pub fn list_ids(&self, view: ListView) -> Vec<EntityId> {
        self.lists
            .get(&view)
            .map(|items| items.iter().map(|p| p.record.id).collect())
            .unwrap_or_default()
    }

    // == Entities ==
    /// Current projection of an entity: the detail copy, else the first list copy.
    pub fn get(&self, id: EntityId) -> Option<Projected> {
        self.details.get(&id).cloned().or_else(|| {
            self.lists
                .values()
                .flat_map(|items| items.iter())
                .find(|p| p.record.id == id)
                .cloned()
        })
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Writes `record` to every copy of the entity and to its detail slot.
    ///
    /// Returns the projection it replaced.
    pub fn project(&mut self, record: Record, provisional: bool) -> Option<Projected> {
        let previous = self.get(record.id);
        let projected = Projected {
            record,
            provisional,
        };
        let id = projected.record.id;

        for item in self.copies_mut(id) {
            *item = projected.clone();
        }
        self.details.insert(id, projected);
        previous
    }

    /// Puts back a projection captured by [`ProjectionStore::project`], as
    /// confirmed: the transaction that restores it is the last to touch it.
    /// `None` means the entity was not projected before, so it is dropped.
    pub fn restore(&mut self, id: EntityId, previous: Option<Projected>) {
        match previous {
            Some(projected) => {
                self.project(projected.record, false);
            }
            None => {
                self.remove_entity(id);
            }
        }
    }

    /// Merges reloaded sections into every copy. Returns false when the entity
    /// is not projected anywhere.
    pub fn merge_sections(&mut self, id: EntityId, sections: BTreeMap<String, Value>) -> bool {
        let mut found = false;
        for item in self.copies_mut(id) {
            item.record.merge_sections(sections.clone());
            found = true;
        }
        if let Some(detail) = self.details.get_mut(&id) {
            detail.record.merge_sections(sections);
            found = true;
        }
        found
    }

    pub fn clear_provisional(&mut self, id: EntityId) {
        for item in self.copies_mut(id) {
            item.provisional = false;
        }
        if let Some(detail) = self.details.get_mut(&id) {
            detail.provisional = false;
        }
    }

    pub fn is_provisional(&self, id: EntityId) -> bool {
        self.details.get(&id).is_some_and(|p| p.provisional)
            || self
                .lists
                .values()
                .flat_map(|items| items.iter())
                .any(|p| p.record.id == id && p.provisional)
    }

    /// Removes the entity from every list and from the detail projections.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let mut removed = self.details.remove(&id).is_some();
        for items in self.lists.values_mut() {
            let before = items.len();
            items.retain(|p| p.record.id != id);
            removed |= items.len() != before;
        }
        removed
    }

    /// Number of entity copies still awaiting confirmation.
    pub fn provisional_count(&self) -> usize {
        self.details.values().filter(|p| p.provisional).count()
            + self
                .lists
                .values()
                .flat_map(|items| items.iter())
                .filter(|p| p.provisional)
                .count()
    }

    fn copies_mut(&mut self, id: EntityId) -> impl Iterator<Item = &mut Projected> {
        self.lists
            .values_mut()
            .flat_map(|items| items.iter_mut())
            .filter(move |p| p.record.id == id)
    }
}
