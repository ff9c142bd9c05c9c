//! Request DTOs for the sync daemon API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::refresh::{ActionKind, RefreshContext};

const MAX_KEY_LEN: usize = 256;

/// Request body for PUT /cache
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// Any JSON payload
    pub value: Value,
    /// Optional TTL in milliseconds (cache default if not specified)
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LEN {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LEN
            ));
        }
        if self.ttl_ms == Some(0) {
            return Some("TTL must be positive".to_string());
        }
        None
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

/// Request body for POST /cache/invalidate
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Regular expression matched against cache keys
    pub pattern: String,
}

impl InvalidateRequest {
    pub fn compile(&self) -> Result<Regex> {
        Regex::new(&self.pattern).map_err(|err| {
            SyncError::InvalidRequest(format!("Invalid pattern '{}': {}", self.pattern, err))
        })
    }
}

/// Request body for POST /refresh
///
/// `entity_id`, `sections` and `flags` sit next to `action` at the top level.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshBody {
    pub action: ActionKind,
    #[serde(flatten)]
    pub context: RefreshContext,
}
