//! Refresh Requests
//!
//! Action kinds raised by write handlers and the table that turns one action
//! into the reloads it requires.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::projection::{EntityId, ListView};

// == Action Kind ==
/// Closed set of write actions the UI reports, plus a catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    StepAdded,
    AnnexAdded,
    EntityReplicated,
    EntityCreated,
    ParametersUpdated,
    StatusUpdated,
    OwnerUpdated,
    PaymentUpdated,
    FullEntityRefresh,
    /// Any action without a dedicated rule
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::StepAdded => "step_added",
            ActionKind::AnnexAdded => "annex_added",
            ActionKind::EntityReplicated => "entity_replicated",
            ActionKind::EntityCreated => "entity_created",
            ActionKind::ParametersUpdated => "parameters_updated",
            ActionKind::StatusUpdated => "status_updated",
            ActionKind::OwnerUpdated => "owner_updated",
            ActionKind::PaymentUpdated => "payment_updated",
            ActionKind::FullEntityRefresh => "full_entity_refresh",
            ActionKind::Other(name) => name,
        }
    }

    /// Section reloaded by a sub-record action.
    fn sub_record_section(&self) -> Option<&'static str> {
        match self {
            ActionKind::StepAdded => Some("steps"),
            ActionKind::AnnexAdded => Some("annexes"),
            _ => None,
        }
    }
}

impl From<String> for ActionKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "step_added" => ActionKind::StepAdded,
            "annex_added" => ActionKind::AnnexAdded,
            "entity_replicated" => ActionKind::EntityReplicated,
            "entity_created" => ActionKind::EntityCreated,
            "parameters_updated" => ActionKind::ParametersUpdated,
            "status_updated" => ActionKind::StatusUpdated,
            "owner_updated" => ActionKind::OwnerUpdated,
            "payment_updated" => ActionKind::PaymentUpdated,
            "full_entity_refresh" => ActionKind::FullEntityRefresh,
            _ => ActionKind::Other(name),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for ActionKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ActionKind::from(s.to_string()))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Scope Flags ==
/// What else a write may have changed besides the entity itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeFlags {
    pub status_changed: bool,
    pub type_changed: bool,
    pub owner_changed: bool,
    pub affects_assigned: bool,
    pub affects_created: bool,
}

impl ScopeFlags {
    fn changes_membership(&self) -> bool {
        self.status_changed || self.type_changed || self.owner_changed
    }
}

// == Refresh Context ==
/// Optional details accompanying an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshContext {
    pub entity_id: Option<EntityId>,
    pub sections: BTreeSet<String>,
    pub flags: ScopeFlags,
}

impl RefreshContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn entity(id: EntityId) -> Self {
        Self {
            entity_id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections.extend(sections.into_iter().map(Into::into));
        self
    }

    pub fn with_flags(mut self, flags: ScopeFlags) -> Self {
        self.flags = flags;
        self
    }
}

// == Reload Scope ==
/// How much of an entity to reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadScope {
    Full,
    Sections(BTreeSet<String>),
}

impl ReloadScope {
    pub fn sections<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReloadScope::Sections(names.into_iter().map(Into::into).collect())
    }

    /// Full supersedes sections; sections union.
    pub fn merge(self, other: ReloadScope) -> ReloadScope {
        match (self, other) {
            (ReloadScope::Sections(mut a), ReloadScope::Sections(b)) => {
                a.extend(b);
                ReloadScope::Sections(a)
            }
            _ => ReloadScope::Full,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, ReloadScope::Full)
    }
}

// == Refresh Request ==
/// What a queued request reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTarget {
    List(ListView),
    Entity { id: EntityId, scope: ReloadScope },
}

/// A single queued reload, tagged with the action that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshRequest {
    pub action: ActionKind,
    pub target: RefreshTarget,
}

impl RefreshRequest {
    pub fn list(action: ActionKind, view: ListView) -> Self {
        Self {
            action,
            target: RefreshTarget::List(view),
        }
    }

    pub fn entity(action: ActionKind, id: EntityId, scope: ReloadScope) -> Self {
        Self {
            action,
            target: RefreshTarget::Entity { id, scope },
        }
    }
}

// == Action Table ==
/// Maps an action and its context to the reloads it requires.
pub fn requests_for(action: &ActionKind, context: &RefreshContext) -> Vec<RefreshRequest> {
    let flags = context.flags;
    let list = |view| RefreshRequest::list(action.clone(), view);
    let all_lists = || ListView::ALL_VIEWS.into_iter().map(list).collect::<Vec<_>>();

    match (action, context.entity_id) {
        // Entity creation is the one rule that does not need an id
        (ActionKind::EntityCreated | ActionKind::EntityReplicated, _) => {
            let mut requests = vec![list(ListView::All), list(ListView::Created)];
            if flags.affects_assigned {
                requests.push(list(ListView::Assigned));
            }
            requests
        }

        (ActionKind::StepAdded | ActionKind::AnnexAdded, Some(id)) => {
            let mut sections = context.sections.clone();
            if let Some(section) = action.sub_record_section() {
                sections.insert(section.to_string());
            }
            vec![RefreshRequest::entity(
                action.clone(),
                id,
                ReloadScope::Sections(sections),
            )]
        }

        (ActionKind::StatusUpdated | ActionKind::OwnerUpdated, Some(id)) => {
            let mut requests = vec![RefreshRequest::entity(action.clone(), id, ReloadScope::Full)];
            if flags.affects_assigned {
                requests.push(list(ListView::Assigned));
            }
            if flags.affects_created {
                requests.push(list(ListView::Created));
            }
            requests
        }

        (_, Some(id)) => {
            let mut requests = vec![RefreshRequest::entity(action.clone(), id, ReloadScope::Full)];
            if flags.changes_membership() {
                requests.extend(all_lists());
            }
            requests
        }

        (_, None) => all_lists(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(action: ActionKind, context: RefreshContext) -> Vec<RefreshTarget> {
        requests_for(&action, &context)
            .into_iter()
            .map(|r| r.target)
            .collect()
    }

    #[test]
    fn test_action_kind_wire_names() {
        assert_eq!("step_added".parse::<ActionKind>().unwrap(), ActionKind::StepAdded);
        assert_eq!(
            "archived".parse::<ActionKind>().unwrap(),
            ActionKind::Other("archived".to_string())
        );
        let json = serde_json::to_string(&ActionKind::PaymentUpdated).unwrap();
        assert_eq!(json, "\"payment_updated\"");
        let kind: ActionKind = serde_json::from_str("\"entity_created\"").unwrap();
        assert_eq!(kind, ActionKind::EntityCreated);
    }

    #[test]
    fn test_sub_record_reloads_only_sections() {
        assert_eq!(
            targets(ActionKind::AnnexAdded, RefreshContext::entity(7)),
            vec![RefreshTarget::Entity {
                id: 7,
                scope: ReloadScope::sections(["annexes"]),
            }]
        );
        assert_eq!(
            targets(
                ActionKind::StepAdded,
                RefreshContext::entity(7).with_sections(["payments"])
            ),
            vec![RefreshTarget::Entity {
                id: 7,
                scope: ReloadScope::sections(["payments", "steps"]),
            }]
        );
    }

    #[test]
    fn test_status_change_reloads_flagged_lists() {
        let flags = ScopeFlags {
            status_changed: true,
            affects_assigned: true,
            ..ScopeFlags::default()
        };
        assert_eq!(
            targets(ActionKind::StatusUpdated, RefreshContext::entity(7).with_flags(flags)),
            vec![
                RefreshTarget::Entity { id: 7, scope: ReloadScope::Full },
                RefreshTarget::List(ListView::Assigned),
            ]
        );

        assert_eq!(
            targets(ActionKind::OwnerUpdated, RefreshContext::entity(7)),
            vec![RefreshTarget::Entity { id: 7, scope: ReloadScope::Full }]
        );
    }

    #[test]
    fn test_creation_reloads_displaying_lists() {
        assert_eq!(
            targets(ActionKind::EntityCreated, RefreshContext::none()),
            vec![RefreshTarget::List(ListView::All), RefreshTarget::List(ListView::Created)]
        );
        let flags = ScopeFlags {
            affects_assigned: true,
            ..ScopeFlags::default()
        };
        assert_eq!(
            targets(ActionKind::EntityReplicated, RefreshContext::entity(3).with_flags(flags)).len(),
            3
        );
    }

    #[test]
    fn test_unknown_with_entity() {
        assert_eq!(
            targets(ActionKind::ParametersUpdated, RefreshContext::entity(4)),
            vec![RefreshTarget::Entity { id: 4, scope: ReloadScope::Full }]
        );

        let flags = ScopeFlags {
            type_changed: true,
            ..ScopeFlags::default()
        };
        let result = targets(
            ActionKind::Other("archived".to_string()),
            RefreshContext::entity(4).with_flags(flags),
        );
        assert_eq!(result.len(), 4);
        assert_eq!(result[0], RefreshTarget::Entity { id: 4, scope: ReloadScope::Full });
    }

    #[test]
    fn test_no_entity_falls_back_to_all_lists() {
        let expected: Vec<RefreshTarget> =
            ListView::ALL_VIEWS.into_iter().map(RefreshTarget::List).collect();

        assert_eq!(targets(ActionKind::Other("sync".to_string()), RefreshContext::none()), expected);
        assert_eq!(targets(ActionKind::StepAdded, RefreshContext::none()), expected);
        assert_eq!(targets(ActionKind::StatusUpdated, RefreshContext::none()), expected);
    }

    #[test]
    fn test_scope_merge() {
        let merged = ReloadScope::sections(["steps"]).merge(ReloadScope::sections(["annexes"]));
        assert_eq!(merged, ReloadScope::sections(["annexes", "steps"]));
        assert!(ReloadScope::sections(["steps"]).merge(ReloadScope::Full).is_full());
        assert!(ReloadScope::Full.merge(ReloadScope::sections(["steps"])).is_full());
    }
}
