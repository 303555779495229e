//! Chat message repository.

use parley_types::chat::ChatMessage;
use parley_types::error::StorageError;
use tracing::debug;

use crate::storage::context::StorageContext;
use crate::storage::query::{ContinuationToken, Filter, OrderBy, Page, QuerySpec};

use super::base::Repository;

/// Wire field names for `ChatMessage`.
const FIELD_CHAT_ID: &str = "chatId";
const FIELD_TIMESTAMP: &str = "timestamp";

/// Page size used when walking a full chat history.
const HISTORY_PAGE_SIZE: usize = 10;

/// Repository for chat messages, partitioned by chat id and sorted by
/// timestamp.
pub struct ChatMessageRepository<C> {
    repo: Repository<ChatMessage, C>,
}

impl<C: StorageContext<ChatMessage>> ChatMessageRepository<C> {
    pub fn new(context: C) -> Self {
        Self { repo: Repository::new(context) }
    }

    pub async fn create(&self, message: &ChatMessage) -> Result<(), StorageError> {
        self.repo.create(message).await
    }

    pub async fn upsert(&self, message: &ChatMessage) -> Result<(), StorageError> {
        self.repo.upsert(message).await
    }

    pub async fn delete(&self, message: &ChatMessage) -> Result<(), StorageError> {
        self.repo.delete(message).await
    }

    pub async fn try_find_by_id(
        &self,
        id: &str,
        chat_id: &str,
    ) -> Result<Option<ChatMessage>, StorageError> {
        self.repo.try_find_by_id(id, Some(chat_id)).await
    }

    /// Number of messages in a chat.
    pub async fn count_by_chat_id(&self, chat_id: &str) -> Result<u64, StorageError> {
        self.repo.count(chat_id, None).await
    }

    /// One page of a chat's messages, most recent first.
    ///
    /// The returned token fetches the next (older) page; `None` means the
    /// history is exhausted.
    pub async fn find_by_chat_id(
        &self,
        chat_id: &str,
        count: usize,
        continuation: Option<ContinuationToken>,
    ) -> Result<Page<ChatMessage>, StorageError> {
        let spec = QuerySpec::filtered(Filter::eq(FIELD_CHAT_ID, chat_id))
            .in_partition(chat_id)
            .order_by(OrderBy::descending(FIELD_TIMESTAMP));
        self.repo.query_paged(spec, count, continuation).await
    }

    /// A chat's messages most-recent-first, walking the token chain
    /// until `limit` messages are collected or the pages run out. No
    /// limit means the full history.
    pub async fn find_by_chat_id_history(
        &self,
        chat_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, StorageError> {
        let mut messages: Vec<ChatMessage> = Vec::new();
        let mut continuation = None;

        loop {
            let remaining = limit.map(|l| l.saturating_sub(messages.len()));
            if remaining == Some(0) {
                break;
            }
            let page_size = remaining.unwrap_or(HISTORY_PAGE_SIZE);

            let page = self
                .find_by_chat_id(chat_id, page_size, continuation)
                .await?;
            messages.extend(page.items);
            continuation = page.continuation;

            if continuation.is_none() {
                break;
            }
        }

        if let Some(limit) = limit {
            messages.truncate(limit);
        }
        debug!(chat_id, count = messages.len(), "loaded chat history");
        Ok(messages)
    }
}
