//! Record Sync daemon
//!
//! Serves the cache, the refresh queue and the projected list views over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use serde_json::json;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use record_sync::api::{create_router, AppState};
use record_sync::cache::{CacheConfig, FileStore, SharedCache, TtlCache};
use record_sync::projection::{ListView, ProjectionStore, Record};
use record_sync::refresh::{CoordinatorConfig, RefreshCoordinator};
use record_sync::source::InMemorySource;
use record_sync::{spawn_sweep_task, Config};

/// Cached list queries share this prefix and are dropped before list reloads.
const LIST_QUERY_PATTERN: &str = "^filtered_";

/// Main entry point for the sync daemon.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the durable mirror and rehydrate the cache
/// 4. Start the refresh coordinator and the expiry sweep
/// 5. Serve the Axum router until SIGINT/SIGTERM
/// 6. Drain queued refreshes and stop background tasks
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "record_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Record Sync daemon");

    let config = Config::from_env();
    info!(
        max_entries = config.max_entries,
        default_ttl_ms = config.default_ttl_ms,
        debounce_ms = config.debounce_ms,
        port = config.server_port,
        "Configuration loaded"
    );

    let mirror = FileStore::open(&config.storage_dir)
        .with_context(|| format!("opening durable store at {}", config.storage_dir.display()))?;
    let cache = SharedCache::new(TtlCache::open(CacheConfig::from(&config), Arc::new(mirror)));
    info!(entries = cache.len().await, "Cache rehydrated");

    let source = Arc::new(InMemorySource::new("demo").with_records(demo_records()));
    let coordinator_config = CoordinatorConfig {
        list_cache_pattern: Some(Regex::new(LIST_QUERY_PATTERN)?),
        ..CoordinatorConfig::from(&config)
    };
    let coordinator = Arc::new(RefreshCoordinator::start(
        coordinator_config,
        source,
        ProjectionStore::shared(),
        Some(cache.clone()),
    ));
    for view in ListView::ALL_VIEWS {
        if let Err(err) = coordinator.reload_list(view).await {
            warn!(view = %view, error = %err, "Initial list load failed");
        }
    }

    let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_secs(config.sweep_interval));

    let app = create_router(AppState::new(cache, coordinator.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    sweep_handle.abort();
    coordinator.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Seed data for the in-memory source.
fn demo_records() -> Vec<Record> {
    vec![
        Record::new(1, "Supplier agreement", "draft")
            .with_owner("demo")
            .with_creator("demo")
            .with_section("steps", json!([{"name": "review", "done": false}])),
        Record::new(2, "Office lease", "signing")
            .with_owner("demo")
            .with_creator("legal")
            .with_section("annexes", json!([{"name": "floor plan"}])),
        Record::new(3, "NDA", "signed").with_creator("demo"),
    ]
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
