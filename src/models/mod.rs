//! Request and Response models for the sync daemon API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{InvalidateRequest, RefreshBody, SetRequest};
pub use responses::{
    DeleteResponse, EntitiesResponse, ErrorResponse, GetResponse, HealthResponse,
    InvalidateResponse, RefreshAccepted, SetResponse,
};
