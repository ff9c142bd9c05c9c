//! API Handlers
//!
//! HTTP request handlers for each daemon endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use crate::cache::{CacheStats, SharedCache};
use crate::error::{Result, SyncError};
use crate::models::{
    DeleteResponse, EntitiesResponse, GetResponse, HealthResponse, InvalidateRequest,
    InvalidateResponse, RefreshAccepted, RefreshBody, SetRequest, SetResponse,
};
use crate::projection::ListView;
use crate::refresh::RefreshCoordinator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: SharedCache,
    /// Owns the projection served by `/entities/:view`
    pub coordinator: Arc<RefreshCoordinator>,
}

impl AppState {
    pub fn new(cache: SharedCache, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { cache, coordinator }
    }
}

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(SyncError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl();
    if !state.cache.set(req.key.clone(), req.value, ttl).await {
        return Err(SyncError::InvalidRequest(format!(
            "Value for '{}' exceeds the maximum entry size",
            req.key
        )));
    }

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/:key
///
/// Expired and unknown keys are both 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(SyncError::NotFound(format!("Key '{}'", key))),
    }
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.delete(&key).await {
        return Err(SyncError::NotFound(format!("Key '{}'", key)));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    let pattern = req.compile()?;
    let removed = state.cache.invalidate_by_pattern(&pattern).await;
    debug!(pattern = %pattern, removed, "Pattern invalidation via API");

    Ok(Json(InvalidateResponse { removed }))
}

/// Handler for POST /refresh
///
/// Queues only; the reloads run after the debounce window.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> (StatusCode, Json<RefreshAccepted>) {
    let queued = state.coordinator.smart_refresh(body.action, body.context);
    (StatusCode::ACCEPTED, Json(RefreshAccepted { queued }))
}

/// Handler for GET /entities/:view
pub async fn entities_handler(
    State(state): State<AppState>,
    Path(view): Path<String>,
) -> Result<Json<EntitiesResponse>> {
    let view: ListView = view.parse()?;
    let entities = state.coordinator.projection().read().await.list(view);

    Ok(Json(EntitiesResponse { view, entities }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
