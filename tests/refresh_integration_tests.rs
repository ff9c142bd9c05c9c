//! Integration Tests for the Refresh Coordinator
//!
//! Drives the debounce worker against an in-memory source and checks which
//! loaders actually ran.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use record_sync::{
    projection::{ListView, ProjectionStore, Record},
    refresh::{ActionKind, CoordinatorConfig, RefreshContext, RefreshCoordinator, ScopeFlags},
    source::{InMemorySource, LoaderCall},
};
use serde_json::json;

const DEBOUNCE: Duration = Duration::from_millis(60);

// == Helper Functions ==

fn source() -> Arc<InMemorySource> {
    Arc::new(InMemorySource::new("ana").with_records([
        Record::new(7, "Lease", "draft")
            .with_owner("ana")
            .with_section("steps", json!(["draft", "review"]))
            .with_section("annexes", json!([])),
        Record::new(8, "Memo", "open").with_creator("ana"),
        Record::new(9, "Audit", "open").with_owner("bob"),
    ]))
}

fn start(source: &Arc<InMemorySource>) -> RefreshCoordinator {
    let config = CoordinatorConfig {
        debounce: DEBOUNCE,
        list_cache_pattern: None,
    };
    RefreshCoordinator::start(config, source.clone(), ProjectionStore::shared(), None)
}

async fn settle() {
    tokio::time::sleep(DEBOUNCE * 4).await;
}

fn steps() -> BTreeSet<String> {
    BTreeSet::from(["steps".to_string()])
}

// == Coalescing ==

#[tokio::test]
async fn test_burst_of_step_additions_loads_once() {
    let source = source();
    let coordinator = start(&source);

    for _ in 0..3 {
        coordinator.smart_refresh(ActionKind::StepAdded, RefreshContext::entity(7));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    settle().await;

    assert_eq!(source.calls(), vec![LoaderCall::Sections(7, steps())]);
}

#[tokio::test]
async fn test_repeated_creations_load_each_list_once() {
    let source = source();
    let coordinator = start(&source);

    coordinator.smart_refresh(ActionKind::EntityCreated, RefreshContext::none());
    coordinator.smart_refresh(ActionKind::EntityCreated, RefreshContext::none());
    settle().await;

    assert_eq!(source.count_calls(&LoaderCall::All), 1);
    assert_eq!(source.count_calls(&LoaderCall::Created), 1);
    assert_eq!(source.count_calls(&LoaderCall::Assigned), 0);
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test]
async fn test_full_reload_absorbs_section_reload() {
    let source = source();
    let coordinator = start(&source);

    coordinator.smart_refresh(ActionKind::StepAdded, RefreshContext::entity(7));
    coordinator.smart_refresh(ActionKind::FullEntityRefresh, RefreshContext::entity(7));
    settle().await;

    assert_eq!(source.entity_calls(7), vec![LoaderCall::One(7)]);
}

// == Scoping ==

#[tokio::test]
async fn test_status_update_reloads_entity_and_assigned_list() {
    let source = source();
    let coordinator = start(&source);
    let flags = ScopeFlags {
        status_changed: true,
        affects_assigned: true,
        ..ScopeFlags::default()
    };

    coordinator.smart_refresh(
        ActionKind::StatusUpdated,
        RefreshContext::entity(7).with_flags(flags),
    );
    settle().await;

    let mut calls = source.calls();
    calls.sort_by_key(|c| format!("{:?}", c));
    assert_eq!(calls, vec![LoaderCall::Assigned, LoaderCall::One(7)]);
}

#[tokio::test]
async fn test_annex_addition_never_touches_lists() {
    let source = source();
    let coordinator = start(&source);

    coordinator.smart_refresh(ActionKind::AnnexAdded, RefreshContext::entity(7));
    settle().await;

    assert!(source.no_list_calls());
    assert_eq!(
        source.calls(),
        vec![LoaderCall::Sections(7, BTreeSet::from(["annexes".to_string()]))]
    );
}

#[tokio::test]
async fn test_sections_reload_merges_into_projection() {
    let source = source();
    let coordinator = start(&source);
    coordinator.reload_list(ListView::All).await.unwrap();

    let mut updated = source.record(7).unwrap();
    updated.status = "remote-only".to_string();
    updated.sections.insert("steps".to_string(), json!(["draft", "review", "sign"]));
    source.upsert(updated);

    coordinator.smart_refresh(ActionKind::StepAdded, RefreshContext::entity(7));
    coordinator.flush().await;

    let projected = coordinator.projection().read().await.get(7).unwrap();
    assert_eq!(projected.record.sections["steps"], json!(["draft", "review", "sign"]));
    // Only the section was reloaded, not the rest of the record
    assert_eq!(projected.record.status, "draft");
}

// == Lifecycle ==

#[tokio::test]
async fn test_requests_during_drain_are_not_lost() {
    let source = Arc::new(
        InMemorySource::new("ana")
            .with_records([Record::new(7, "Lease", "draft"), Record::new(8, "Memo", "open")])
            .with_latency(Duration::from_millis(80)),
    );
    let coordinator = start(&source);

    coordinator.smart_refresh(ActionKind::FullEntityRefresh, RefreshContext::entity(7));
    // Lands while the first drain is still loading
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(30)).await;
    coordinator.smart_refresh(ActionKind::FullEntityRefresh, RefreshContext::entity(8));
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(source.count_calls(&LoaderCall::One(7)), 1);
    assert_eq!(source.count_calls(&LoaderCall::One(8)), 1);
    assert_eq!(coordinator.pending_len(), 0);
}

#[tokio::test]
async fn test_reload_events_reach_subscribers() {
    let source = source();
    let coordinator = start(&source);
    let mut events = coordinator.subscribe();

    coordinator.smart_refresh(ActionKind::ParametersUpdated, RefreshContext::entity(8));
    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(event.entity_id, 8);
    assert!(event.is_full_update);
    assert!(event.updated_sections.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_timer_drains() {
    let source = source();
    let coordinator = start(&source);

    coordinator.shutdown().await;
    coordinator.smart_refresh(ActionKind::EntityCreated, RefreshContext::none());
    settle().await;

    // Worker is gone: the request waits for an explicit flush
    assert!(source.calls().is_empty());
    assert_eq!(coordinator.pending_len(), 2);
    coordinator.flush().await;
    assert_eq!(source.calls().len(), 2);
}
