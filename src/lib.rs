//! Record Sync - a client-side data-consistency layer
//!
//! Keeps a view of remote records fresh: a TTL query cache with creation-order
//! eviction and a durable mirror, a debounced refresh coordinator that turns
//! write actions into the minimal set of reloads, and optimistic updates that
//! roll back by refetching.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod optimistic;
pub mod projection;
pub mod refresh;
pub mod source;
pub mod tasks;

pub use api::AppState;
pub use cache::{SharedCache, TtlCache};
pub use config::Config;
pub use error::{Result, SyncError};
pub use optimistic::OptimisticUpdateManager;
pub use refresh::RefreshCoordinator;
pub use tasks::spawn_sweep_task;
