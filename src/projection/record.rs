//! Record Types
//!
//! The remote entity shape and the list views that display it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// Identifier of a remote entity.
pub type EntityId = u64;

// == Record ==
/// A remote entity (document, task) as returned by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: EntityId,
    pub title: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Independently reloadable sub-collections ("steps", "annexes", ...)
    #[serde(default)]
    pub sections: BTreeMap<String, Value>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(id: EntityId, title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: status.into(),
            owner: None,
            created_by: None,
            sections: BTreeMap::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.created_by = Some(creator.into());
        self
    }

    pub fn with_section(mut self, name: impl Into<String>, value: Value) -> Self {
        self.sections.insert(name.into(), value);
        self
    }

    /// Overwrites the named sections, leaving the others untouched.
    pub fn merge_sections(&mut self, sections: BTreeMap<String, Value>) {
        self.sections.extend(sections);
    }
}

// == Projected ==
/// A record as currently shown, with its provisional tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projected {
    pub record: Record,
    /// Set while an optimistic write awaits confirmation
    pub provisional: bool,
}

impl Projected {
    pub fn confirmed(record: Record) -> Self {
        Self {
            record,
            provisional: false,
        }
    }

    pub fn provisional(record: Record) -> Self {
        Self {
            record,
            provisional: true,
        }
    }
}

// == List View ==
/// List views kept in the projection, each with its own loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListView {
    /// Every entity visible to the viewer
    All,
    /// Entities assigned to the viewer
    Assigned,
    /// Entities the viewer created
    Created,
}

impl ListView {
    pub const ALL_VIEWS: [ListView; 3] = [ListView::All, ListView::Assigned, ListView::Created];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListView::All => "all",
            ListView::Assigned => "assigned",
            ListView::Created => "created",
        }
    }
}

impl fmt::Display for ListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListView {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ListView::All),
            "assigned" => Ok(ListView::Assigned),
            "created" => Ok(ListView::Created),
            other => Err(SyncError::InvalidRequest(format!("Unknown list view '{}'", other))),
        }
    }
}
