//! StorageContext trait definition.
//!
//! One implementation per backend lives in `parley-infra`
//! (`VolatileContext`, `FileSystemContext`, `CosmosContext`). Uses native
//! async fn in traits (RPITIT, Rust 2024 edition).

use parley_types::entity::StorageEntity;
use parley_types::error::StorageError;

use super::query::{ContinuationToken, Filter, Page, QuerySpec};

/// Backend-agnostic CRUD-plus-query surface over one entity collection.
///
/// The contract is identical across backends; only the token
/// representation and the physical execution differ. Operations are
/// cancelled by dropping their future; implementations must keep
/// observable state either fully applied or untouched when that happens.
pub trait StorageContext<E: StorageEntity>: Send + Sync {
    /// Insert a new entity. Fails with [`StorageError::AlreadyExists`]
    /// when the id is already present; never silently overwrites.
    fn create(
        &self,
        entity: &E,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Point read by id within one partition. An entity stored under a
    /// different partition is [`StorageError::NotFound`].
    fn read(
        &self,
        id: &str,
        partition: &str,
    ) -> impl std::future::Future<Output = Result<E, StorageError>> + Send;

    /// Insert-or-replace. Always succeeds given a valid id.
    fn upsert(
        &self,
        entity: &E,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Delete an entity. [`StorageError::NotFound`] when absent; the
    /// repository layer maps that to success.
    fn delete(
        &self,
        entity: &E,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Run a query, draining any backend-internal pagination. Order is
    /// unspecified unless the spec carries an `order_by`.
    fn query(
        &self,
        spec: QuerySpec<E>,
    ) -> impl std::future::Future<Output = Result<Vec<E>, StorageError>> + Send;

    /// Fetch one page of results. An absent token starts from the
    /// beginning; a `None` token in the returned page means exhaustion.
    /// For a fixed spec and page size with no concurrent mutation, the
    /// token chain yields every match exactly once. Opaque post-filters
    /// are rejected with [`StorageError::Validation`].
    fn query_paged(
        &self,
        spec: QuerySpec<E>,
        page_size: usize,
        continuation: Option<ContinuationToken>,
    ) -> impl std::future::Future<Output = Result<Page<E>, StorageError>> + Send;

    /// Count matching entities in a partition, draining backend
    /// pagination to exhaustion.
    fn count(
        &self,
        partition: &str,
        filter: Option<Filter>,
    ) -> impl std::future::Future<Output = Result<u64, StorageError>> + Send;
}

/// Reject empty (or whitespace-only) entity ids before any backend work.
pub fn ensure_entity_id(id: &str) -> Result<(), StorageError> {
    if id.trim().is_empty() {
        return Err(StorageError::validation("entity id cannot be empty"));
    }
    Ok(())
}
