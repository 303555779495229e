//! Shared domain types for Parley.
//!
//! This crate contains the types used across the Parley persistence layer:
//! the `StorageEntity` capability trait, the concrete chat entities, the
//! storage error taxonomy, and backend configuration types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror,
//! secrecy.

pub mod chat;
pub mod config;
pub mod entity;
pub mod error;
pub mod preference;
