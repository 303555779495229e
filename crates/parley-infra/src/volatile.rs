//! In-memory storage context.
//!
//! Entities live in a concurrent map and vanish on process restart by
//! design. Used for ephemeral, test, and demo deployments.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use parley_core::storage::context::{StorageContext, ensure_entity_id};
use parley_core::storage::mem;
use parley_core::storage::query::{ContinuationToken, Filter, Page, QuerySpec};
use parley_types::entity::StorageEntity;
use parley_types::error::StorageError;

/// A storage context that keeps entities in process memory.
///
/// Concurrent reads never block each other; writes are atomic per key.
pub struct VolatileContext<E: StorageEntity> {
    entities: DashMap<String, E>,
}

impl<E: StorageEntity> VolatileContext<E> {
    pub fn new() -> Self {
        Self { entities: DashMap::new() }
    }

    /// Clone out the current entity set. Queries run against this
    /// snapshot, so a concurrent mutation cannot tear a result set.
    fn snapshot(&self) -> Vec<E> {
        self.entities.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl<E: StorageEntity> Default for VolatileContext<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: StorageEntity> StorageContext<E> for VolatileContext<E> {
    async fn create(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        // Entry API makes the check-then-insert atomic; a duplicate id is
        // never silently overwritten.
        match self.entities.entry(entity.id().to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(entity.clone());
                Ok(())
            }
        }
    }

    async fn read(&self, id: &str, partition: &str) -> Result<E, StorageError> {
        ensure_entity_id(id)?;
        self.entities
            .get(id)
            .filter(|entity| entity.partition() == partition)
            .map(|entity| entity.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn upsert(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        self.entities.insert(entity.id().to_string(), entity.clone());
        Ok(())
    }

    async fn delete(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        self.entities
            .remove(entity.id())
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn query(&self, spec: QuerySpec<E>) -> Result<Vec<E>, StorageError> {
        mem::run_query(self.snapshot(), &spec)
    }

    async fn query_paged(
        &self,
        spec: QuerySpec<E>,
        page_size: usize,
        continuation: Option<ContinuationToken>,
    ) -> Result<Page<E>, StorageError> {
        mem::run_query_paged(self.snapshot(), &spec, page_size, continuation.as_ref())
    }

    async fn count(&self, partition: &str, filter: Option<Filter>) -> Result<u64, StorageError> {
        mem::run_count(self.snapshot(), partition, filter.as_ref())
    }
}
