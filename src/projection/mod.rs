//! Entity Projection Module
//!
//! Local projections of remote records: three list views plus per-entity
//! detail projections, each tagged provisional or confirmed.

mod record;
mod store;

pub use record::{EntityId, ListView, Projected, Record};
pub use store::{ProjectionStore, SharedProjection};
