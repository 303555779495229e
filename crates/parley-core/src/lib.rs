//! Storage contract and repository layer for Parley.
//!
//! This crate defines the backend-agnostic `StorageContext` trait that the
//! infrastructure layer implements, the query model shared by every
//! backend, and the per-entity repositories that controllers consume. It
//! depends only on `parley-types` -- never on `parley-infra` or any
//! database/IO crate.

pub mod repository;
pub mod storage;
