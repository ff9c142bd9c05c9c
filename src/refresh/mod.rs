//! Refresh Coordination Module
//!
//! Turns "something changed" notifications from independent UI actions into
//! a debounced, coalesced set of reloads.
//!
//! # Flow
//! - `smart_refresh` maps an action to requests through a fixed table
//! - each request lands in the pending queue and restarts the debounce timer
//! - after a quiet window the queue is drained into a `ReloadPlan` and run

mod coordinator;
mod debounce;
mod plan;
mod request;

pub use coordinator::{CoordinatorConfig, DrainReport, RefreshCoordinator, ReloadEvent};
pub use debounce::Debounce;
pub use plan::ReloadPlan;
pub use request::{
    requests_for, ActionKind, RefreshContext, RefreshRequest, RefreshTarget, ReloadScope,
    ScopeFlags,
};
