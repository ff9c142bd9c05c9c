//! Reload Plan
//!
//! Collapses a drained batch of requests into the minimal set of reloads.

use std::collections::{BTreeMap, BTreeSet};

use super::{RefreshRequest, RefreshTarget, ReloadScope};
use crate::projection::{EntityId, ListView};

/// Minimal reload set for one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadPlan {
    pub lists: BTreeSet<ListView>,
    pub entities: BTreeMap<EntityId, ReloadScope>,
}

impl ReloadPlan {
    /// Partitions requests into list and entity reloads. Per entity, a full
    /// reload supersedes section reloads and section sets are unioned.
    pub fn from_requests(requests: impl IntoIterator<Item = RefreshRequest>) -> Self {
        let mut plan = Self::default();
        for request in requests {
            match request.target {
                RefreshTarget::List(view) => {
                    plan.lists.insert(view);
                }
                RefreshTarget::Entity { id, scope } => {
                    let scope = match scope {
                        ReloadScope::Sections(names) if names.is_empty() => ReloadScope::Full,
                        other => other,
                    };
                    let merged = match plan.entities.remove(&id) {
                        Some(existing) => existing.merge(scope),
                        None => scope,
                    };
                    plan.entities.insert(id, merged);
                }
            }
        }
        plan
    }

    /// Number of reload operations the plan will run.
    pub fn len(&self) -> usize {
        self.lists.len() + self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty() && self.entities.is_empty()
    }
}
