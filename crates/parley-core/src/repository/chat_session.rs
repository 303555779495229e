//! Chat session repository.

use parley_types::chat::ChatSession;
use parley_types::error::StorageError;

use crate::storage::context::StorageContext;
use crate::storage::query::{Filter, QuerySpec};

use super::base::Repository;

/// Repository for chat sessions. Sessions are self-partitioned, so point
/// reads default the partition to the session id.
pub struct ChatSessionRepository<C> {
    repo: Repository<ChatSession, C>,
}

impl<C: StorageContext<ChatSession>> ChatSessionRepository<C> {
    pub fn new(context: C) -> Self {
        Self { repo: Repository::new(context) }
    }

    pub async fn create(&self, session: &ChatSession) -> Result<(), StorageError> {
        self.repo.create(session).await
    }

    pub async fn upsert(&self, session: &ChatSession) -> Result<(), StorageError> {
        self.repo.upsert(session).await
    }

    pub async fn delete(&self, session: &ChatSession) -> Result<(), StorageError> {
        self.repo.delete(session).await
    }

    /// All chat sessions. Cross-partition fan-out on the cloud backend;
    /// administrative listing only, never a hot path.
    pub async fn get_all(&self) -> Result<Vec<ChatSession>, StorageError> {
        self.repo.query(QuerySpec::all()).await
    }

    /// Point read by session id (partition = id).
    pub async fn get_by_id(&self, id: &str) -> Result<Option<ChatSession>, StorageError> {
        self.repo.try_find_by_id(id, None).await
    }

    /// Id lookup without a partition, for records written before
    /// sessions were self-partitioned. Scans the whole collection.
    pub async fn get_by_id_scan(&self, id: &str) -> Result<Option<ChatSession>, StorageError> {
        let mut results = self
            .repo
            .query(QuerySpec::filtered(Filter::eq("id", id)))
            .await?;
        Ok(results.pop())
    }
}
