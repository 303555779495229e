//! Storage backend implementations for Parley.
//!
//! Three implementations of `parley_core::storage::StorageContext` behind
//! one contract:
//!
//! - [`volatile::VolatileContext`] -- in-process concurrent map, reset on
//!   restart.
//! - [`filesystem::FileSystemContext`] -- the same map mirrored to one
//!   JSON document per container.
//! - [`cosmos::CosmosContext`] -- Azure Cosmos DB over its REST API with
//!   master-key request signing.
//!
//! Plus the TOML configuration loader and the [`provider::ChatStore`]
//! wiring one configured backend into all four repositories.

pub mod config;
pub mod cosmos;
pub mod filesystem;
pub mod provider;
pub mod volatile;
