//! Chat participant repository.

use parley_types::chat::ChatParticipant;
use parley_types::error::StorageError;

use crate::storage::context::StorageContext;
use crate::storage::query::{ContinuationToken, Filter, OrderBy, Page, QuerySpec};

use super::base::Repository;

/// Wire field names for `ChatParticipant`.
const FIELD_USER_ID: &str = "userId";
const FIELD_CHAT_ID: &str = "chatId";
const FIELD_LAST_MODIFIED: &str = "lastModified";

/// Repository for chat participants.
///
/// Participants partition on user id. Chat-scoped lookups override the
/// natural partition and go cross-partition with a chat-id filter; the
/// collection is not double-indexed.
pub struct ChatParticipantRepository<C> {
    repo: Repository<ChatParticipant, C>,
}

impl<C: StorageContext<ChatParticipant>> ChatParticipantRepository<C> {
    pub fn new(context: C) -> Self {
        Self { repo: Repository::new(context) }
    }

    pub async fn create(&self, participant: &ChatParticipant) -> Result<(), StorageError> {
        self.repo.create(participant).await
    }

    pub async fn upsert(&self, participant: &ChatParticipant) -> Result<(), StorageError> {
        self.repo.upsert(participant).await
    }

    pub async fn delete(&self, participant: &ChatParticipant) -> Result<(), StorageError> {
        self.repo.delete(participant).await
    }

    /// Every chat the user participates in.
    pub async fn find_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Vec<ChatParticipant>, StorageError> {
        self.repo
            .query(
                QuerySpec::filtered(Filter::eq(FIELD_USER_ID, user_id)).in_partition(user_id),
            )
            .await
    }

    /// One page of the user's chats, most recently modified first.
    pub async fn find_by_user_id_paged(
        &self,
        user_id: &str,
        count: usize,
        continuation: Option<ContinuationToken>,
    ) -> Result<Page<ChatParticipant>, StorageError> {
        let spec = QuerySpec::filtered(Filter::eq(FIELD_USER_ID, user_id))
            .in_partition(user_id)
            .order_by(OrderBy::descending(FIELD_LAST_MODIFIED));
        self.repo.query_paged(spec, count, continuation).await
    }

    /// Everyone in a chat. Overrides the natural (user id) partition, so
    /// this fans out across partitions on the cloud backend.
    pub async fn find_by_chat_id(
        &self,
        chat_id: &str,
    ) -> Result<Vec<ChatParticipant>, StorageError> {
        self.repo
            .query(QuerySpec::filtered(Filter::eq(FIELD_CHAT_ID, chat_id)))
            .await
    }

    /// Whether the user is a member of the chat.
    pub async fn is_user_in_chat(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<bool, StorageError> {
        let filter = Filter::and([
            Filter::eq(FIELD_USER_ID, user_id),
            Filter::eq(FIELD_CHAT_ID, chat_id),
        ]);
        let matches = self
            .repo
            .query(QuerySpec::filtered(filter).in_partition(user_id))
            .await?;
        Ok(!matches.is_empty())
    }
}
