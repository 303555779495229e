//! Generic repository over one storage context.

use std::marker::PhantomData;

use parley_types::entity::StorageEntity;
use parley_types::error::StorageError;

use crate::storage::context::{StorageContext, ensure_entity_id};
use crate::storage::query::{ContinuationToken, Filter, Page, QuerySpec};

/// Type-specific façade over a [`StorageContext`].
///
/// Adds id validation before mutations, a default-partition fallback for
/// self-partitioned entities, and idempotent deletes. Everything else
/// delegates unchanged.
pub struct Repository<E, C> {
    context: C,
    _entity: PhantomData<fn() -> E>,
}

impl<E, C> Repository<E, C>
where
    E: StorageEntity,
    C: StorageContext<E>,
{
    pub fn new(context: C) -> Self {
        Self { context, _entity: PhantomData }
    }

    /// The underlying storage context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Create an entity after validating its id.
    pub async fn create(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        self.context.create(entity).await
    }

    /// Insert-or-replace an entity after validating its id.
    pub async fn upsert(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        self.context.upsert(entity).await
    }

    /// Delete an entity. Deleting something already gone is a success at
    /// this layer; only the context exposes the `NotFound`.
    pub async fn delete(&self, entity: &E) -> Result<(), StorageError> {
        match self.context.delete(entity).await {
            Err(StorageError::NotFound) => Ok(()),
            other => other,
        }
    }

    /// Point read. The partition defaults to the id itself, which is the
    /// correct partition for self-partitioned entity types.
    pub async fn find_by_id(&self, id: &str, partition: Option<&str>) -> Result<E, StorageError> {
        ensure_entity_id(id)?;
        self.context.read(id, partition.unwrap_or(id)).await
    }

    /// Point read where "not found" is a normal branch, not an error.
    /// Validation failures and misses fold into `None`; backend faults
    /// still propagate.
    pub async fn try_find_by_id(
        &self,
        id: &str,
        partition: Option<&str>,
    ) -> Result<Option<E>, StorageError> {
        match self.find_by_id(id, partition).await {
            Ok(entity) => Ok(Some(entity)),
            Err(StorageError::NotFound | StorageError::Validation(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    pub async fn query(&self, spec: QuerySpec<E>) -> Result<Vec<E>, StorageError> {
        self.context.query(spec).await
    }

    pub async fn query_paged(
        &self,
        spec: QuerySpec<E>,
        page_size: usize,
        continuation: Option<ContinuationToken>,
    ) -> Result<Page<E>, StorageError> {
        self.context.query_paged(spec, page_size, continuation).await
    }

    pub async fn count(
        &self,
        partition: &str,
        filter: Option<Filter>,
    ) -> Result<u64, StorageError> {
        self.context.count(partition, filter).await
    }
}
