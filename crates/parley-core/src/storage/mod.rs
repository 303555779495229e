//! The backend-agnostic storage contract.
//!
//! `context` defines the CRUD-plus-query trait each backend implements,
//! `query` the structured filter and pagination model, and `mem` the
//! shared query engine used by the map-backed (volatile and filesystem)
//! contexts.

pub mod context;
pub mod mem;
pub mod query;

pub use context::{StorageContext, ensure_entity_id};
pub use query::{ContinuationToken, Filter, OrderBy, Page, Predicate, QuerySpec};
