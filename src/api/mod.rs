//! API Module
//!
//! HTTP handlers and routing for the sync daemon REST API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache statistics
//! - `GET /cache/:key` - Read a cached payload
//! - `PUT /cache` - Store a payload
//! - `DELETE /cache/:key` - Delete a key
//! - `POST /cache/invalidate` - Drop every key matching a pattern
//! - `POST /refresh` - Queue a smart refresh for a write action
//! - `GET /entities/:view` - Current projection of a list view

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
