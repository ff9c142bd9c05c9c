//! Error types for the sync layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Sync Error Enum ==
/// Unified error type for the sync layer.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Entity or key does not exist at the source of truth
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote call failed (network, server-side rejection)
    #[error("Remote error: {0}")]
    Remote(String),

    /// Durable store failure (quota, unreadable backing file)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure underneath a durable store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// True for the terminal "entity is gone" case, where reloading is futile.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Remote(_) => StatusCode::BAD_GATEWAY,
            SyncError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SyncError::Storage(_)
            | SyncError::Serialization(_)
            | SyncError::Io(_)
            | SyncError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the sync layer.
pub type Result<T> = std::result::Result<T, SyncError>;
