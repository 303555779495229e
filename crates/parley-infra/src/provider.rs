//! Backend selection and repository wiring.
//!
//! [`BackendContext`] dispatches the storage contract over whichever
//! backend the deployment configured, and [`ChatStore`] builds all four
//! repositories against it. Controllers hold a `ChatStore` and never
//! learn which backend is underneath.

use std::time::Duration;

use parley_core::repository::{
    ChatMessageRepository, ChatParticipantRepository, ChatSessionRepository,
    UserPreferenceRepository,
};
use parley_core::storage::context::StorageContext;
use parley_core::storage::query::{ContinuationToken, Filter, Page, QuerySpec};
use parley_types::chat::{ChatMessage, ChatParticipant, ChatSession};
use parley_types::config::{CosmosStoreConfig, StoreConfig};
use parley_types::entity::StorageEntity;
use parley_types::error::StorageError;
use parley_types::preference::UserPreference;

use crate::cosmos::CosmosContext;
use crate::filesystem::FileSystemContext;
use crate::volatile::VolatileContext;

/// Container (and container-file) names, one per entity type.
pub const CONTAINER_CHAT_SESSIONS: &str = "chat_sessions";
pub const CONTAINER_CHAT_MESSAGES: &str = "chat_messages";
pub const CONTAINER_CHAT_PARTICIPANTS: &str = "chat_participants";
pub const CONTAINER_USER_PREFERENCES: &str = "user_preferences";

/// HTTP timeout for the shared Cosmos client.
const COSMOS_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One storage context behind whichever backend was configured.
pub enum BackendContext<E: StorageEntity> {
    Volatile(VolatileContext<E>),
    Filesystem(FileSystemContext<E>),
    Cosmos(CosmosContext<E>),
}

impl<E: StorageEntity> StorageContext<E> for BackendContext<E> {
    async fn create(&self, entity: &E) -> Result<(), StorageError> {
        match self {
            Self::Volatile(context) => context.create(entity).await,
            Self::Filesystem(context) => context.create(entity).await,
            Self::Cosmos(context) => context.create(entity).await,
        }
    }

    async fn read(&self, id: &str, partition: &str) -> Result<E, StorageError> {
        match self {
            Self::Volatile(context) => context.read(id, partition).await,
            Self::Filesystem(context) => context.read(id, partition).await,
            Self::Cosmos(context) => context.read(id, partition).await,
        }
    }

    async fn upsert(&self, entity: &E) -> Result<(), StorageError> {
        match self {
            Self::Volatile(context) => context.upsert(entity).await,
            Self::Filesystem(context) => context.upsert(entity).await,
            Self::Cosmos(context) => context.upsert(entity).await,
        }
    }

    async fn delete(&self, entity: &E) -> Result<(), StorageError> {
        match self {
            Self::Volatile(context) => context.delete(entity).await,
            Self::Filesystem(context) => context.delete(entity).await,
            Self::Cosmos(context) => context.delete(entity).await,
        }
    }

    async fn query(&self, spec: QuerySpec<E>) -> Result<Vec<E>, StorageError> {
        match self {
            Self::Volatile(context) => context.query(spec).await,
            Self::Filesystem(context) => context.query(spec).await,
            Self::Cosmos(context) => context.query(spec).await,
        }
    }

    async fn query_paged(
        &self,
        spec: QuerySpec<E>,
        page_size: usize,
        continuation: Option<ContinuationToken>,
    ) -> Result<Page<E>, StorageError> {
        match self {
            Self::Volatile(context) => context.query_paged(spec, page_size, continuation).await,
            Self::Filesystem(context) => context.query_paged(spec, page_size, continuation).await,
            Self::Cosmos(context) => context.query_paged(spec, page_size, continuation).await,
        }
    }

    async fn count(&self, partition: &str, filter: Option<Filter>) -> Result<u64, StorageError> {
        match self {
            Self::Volatile(context) => context.count(partition, filter).await,
            Self::Filesystem(context) => context.count(partition, filter).await,
            Self::Cosmos(context) => context.count(partition, filter).await,
        }
    }
}

/// Every chat repository, wired to one configured backend.
pub struct ChatStore {
    pub sessions: ChatSessionRepository<BackendContext<ChatSession>>,
    pub messages: ChatMessageRepository<BackendContext<ChatMessage>>,
    pub participants: ChatParticipantRepository<BackendContext<ChatParticipant>>,
    pub preferences: UserPreferenceRepository<BackendContext<UserPreference>>,
}

impl ChatStore {
    /// Build the store for the configured backend.
    pub async fn from_config(config: &StoreConfig) -> Result<Self, StorageError> {
        match config {
            StoreConfig::Volatile => Ok(Self {
                sessions: ChatSessionRepository::new(BackendContext::Volatile(VolatileContext::new())),
                messages: ChatMessageRepository::new(BackendContext::Volatile(VolatileContext::new())),
                participants: ChatParticipantRepository::new(BackendContext::Volatile(
                    VolatileContext::new(),
                )),
                preferences: UserPreferenceRepository::new(BackendContext::Volatile(
                    VolatileContext::new(),
                )),
            }),
            StoreConfig::Filesystem(fs) => Ok(Self {
                sessions: ChatSessionRepository::new(BackendContext::Filesystem(
                    open_container(&fs.data_dir, CONTAINER_CHAT_SESSIONS).await?,
                )),
                messages: ChatMessageRepository::new(BackendContext::Filesystem(
                    open_container(&fs.data_dir, CONTAINER_CHAT_MESSAGES).await?,
                )),
                participants: ChatParticipantRepository::new(BackendContext::Filesystem(
                    open_container(&fs.data_dir, CONTAINER_CHAT_PARTICIPANTS).await?,
                )),
                preferences: UserPreferenceRepository::new(BackendContext::Filesystem(
                    open_container(&fs.data_dir, CONTAINER_USER_PREFERENCES).await?,
                )),
            }),
            StoreConfig::Cosmos(cosmos) => {
                // One shared client; each context holds a handle and the
                // pool tears down when the last handle drops.
                let http = reqwest::Client::builder()
                    .timeout(COSMOS_HTTP_TIMEOUT)
                    .build()
                    .map_err(|e| {
                        StorageError::Backend(format!("failed to build http client: {e}"))
                    })?;
                Ok(Self::cosmos_with_client(http, cosmos))
            }
        }
    }

    fn cosmos_with_client(http: reqwest::Client, config: &CosmosStoreConfig) -> Self {
        // One CosmosContext per container, all sharing the client.
        Self {
            sessions: ChatSessionRepository::new(BackendContext::Cosmos(CosmosContext::new(
                http.clone(),
                config,
                CONTAINER_CHAT_SESSIONS,
            ))),
            messages: ChatMessageRepository::new(BackendContext::Cosmos(CosmosContext::new(
                http.clone(),
                config,
                CONTAINER_CHAT_MESSAGES,
            ))),
            participants: ChatParticipantRepository::new(BackendContext::Cosmos(
                CosmosContext::new(http.clone(), config, CONTAINER_CHAT_PARTICIPANTS),
            )),
            preferences: UserPreferenceRepository::new(BackendContext::Cosmos(CosmosContext::new(
                http,
                config,
                CONTAINER_USER_PREFERENCES,
            ))),
        }
    }
}

/// Open one container file under the data directory.
async fn open_container<E: StorageEntity>(
    data_dir: &std::path::Path,
    container: &str,
) -> Result<FileSystemContext<E>, StorageError> {
    FileSystemContext::open(data_dir.join(format!("{container}.json"))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use chrono::Utc;
    use parley_types::chat::AuthorRole;
    use parley_types::config::FilesystemStoreConfig;
    use tempfile::TempDir;

    fn message(id: &str, chat_id: &str, secs: i64) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            chat_id: chat_id.to_string(),
            author_role: AuthorRole::User,
            content: format!("message {id}"),
            timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
        }
    }

    async fn volatile_store() -> ChatStore {
        ChatStore::from_config(&StoreConfig::Volatile).await.unwrap()
    }

    #[tokio::test]
    async fn message_pages_walk_most_recent_first() {
        let store = volatile_store().await;
        for i in 1..=25 {
            store
                .messages
                .create(&message(&format!("m{i:02}"), "c1", i))
                .await
                .unwrap();
        }

        let first = store.messages.find_by_chat_id("c1", 10, None).await.unwrap();
        let stamps: Vec<i64> = first.items.iter().map(|m| m.timestamp.timestamp()).collect();
        assert_eq!(stamps, (16..=25).rev().collect::<Vec<_>>());
        let token = first.continuation.expect("more pages expected");

        let second = store
            .messages
            .find_by_chat_id("c1", 10, Some(token))
            .await
            .unwrap();
        let stamps: Vec<i64> = second.items.iter().map(|m| m.timestamp.timestamp()).collect();
        assert_eq!(stamps, (6..=15).rev().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn history_walks_the_whole_chain() {
        let store = volatile_store().await;
        for i in 1..=25 {
            store
                .messages
                .create(&message(&format!("m{i:02}"), "c1", i))
                .await
                .unwrap();
        }

        let full = store
            .messages
            .find_by_chat_id_history("c1", None)
            .await
            .unwrap();
        assert_eq!(full.len(), 25);
        assert_eq!(full.first().unwrap().timestamp.timestamp(), 25);
        assert_eq!(full.last().unwrap().timestamp.timestamp(), 1);

        let limited = store
            .messages
            .find_by_chat_id_history("c1", Some(7))
            .await
            .unwrap();
        assert_eq!(limited.len(), 7);
        assert_eq!(limited.first().unwrap().timestamp.timestamp(), 25);
    }

    #[tokio::test]
    async fn preference_roundtrip() {
        let store = volatile_store().await;
        let mut pref = UserPreference::new("u1");
        pref.dark_mode = true;
        store.preferences.save_user_preference(&pref).await.unwrap();

        let found = store
            .preferences
            .get_user_preference("u1")
            .await
            .unwrap()
            .expect("preference should exist");
        assert!(found.dark_mode);
    }

    #[tokio::test]
    async fn participants_query_both_axes() {
        let store = volatile_store().await;
        store
            .participants
            .create(&ChatParticipant::new("u1", "c1"))
            .await
            .unwrap();
        store
            .participants
            .create(&ChatParticipant::new("u1", "c2"))
            .await
            .unwrap();
        store
            .participants
            .create(&ChatParticipant::new("u2", "c1"))
            .await
            .unwrap();

        let chats = store.participants.find_by_user_id("u1").await.unwrap();
        assert_eq!(chats.len(), 2);

        // Chat-scoped lookup crosses the userId partitions.
        let members = store.participants.find_by_chat_id("c1").await.unwrap();
        assert_eq!(members.len(), 2);

        assert!(store.participants.is_user_in_chat("u1", "c2").await.unwrap());
        assert!(!store.participants.is_user_in_chat("u2", "c2").await.unwrap());
    }

    #[tokio::test]
    async fn participant_pages_order_by_last_modified() {
        let store = volatile_store().await;
        for i in 1..=5 {
            let mut participant = ChatParticipant::new("u1", format!("c{i}"));
            participant.last_modified = DateTime::<Utc>::from_timestamp(i, 0).unwrap();
            store.participants.create(&participant).await.unwrap();
        }

        let first = store
            .participants
            .find_by_user_id_paged("u1", 3, None)
            .await
            .unwrap();
        let chats: Vec<&str> = first.items.iter().map(|p| p.chat_id.as_str()).collect();
        assert_eq!(chats, vec!["c5", "c4", "c3"]);

        let rest = store
            .participants
            .find_by_user_id_paged("u1", 3, first.continuation)
            .await
            .unwrap();
        let chats: Vec<&str> = rest.items.iter().map(|p| p.chat_id.as_str()).collect();
        assert_eq!(chats, vec!["c2", "c1"]);
        assert!(rest.continuation.is_none());
    }

    #[tokio::test]
    async fn sessions_list_and_point_read() {
        let store = volatile_store().await;
        let session = ChatSession::new("First chat", "You are helpful.");
        store.sessions.create(&session).await.unwrap();
        store
            .sessions
            .create(&ChatSession::new("Second chat", "You are terse."))
            .await
            .unwrap();

        assert_eq!(store.sessions.get_all().await.unwrap().len(), 2);

        let found = store.sessions.get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.title, "First chat");
        assert!(store.sessions.get_by_id("absent").await.unwrap().is_none());

        let scanned = store.sessions.get_by_id_scan(&session.id).await.unwrap();
        assert_eq!(scanned.map(|s| s.id), Some(session.id));
    }

    #[tokio::test]
    async fn filesystem_store_persists_across_rebuild() {
        let tmp = TempDir::new().unwrap();
        let config = StoreConfig::Filesystem(FilesystemStoreConfig {
            data_dir: tmp.path().to_path_buf(),
        });

        let store = ChatStore::from_config(&config).await.unwrap();
        let session = ChatSession::new("Durable chat", "You remember things.");
        store.sessions.create(&session).await.unwrap();
        store
            .messages
            .create(&message("m1", &session.id, 1))
            .await
            .unwrap();
        drop(store);

        let reopened = ChatStore::from_config(&config).await.unwrap();
        let found = reopened.sessions.get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Durable chat");
        let history = reopened
            .messages
            .find_by_chat_id_history(&session.id, None)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }
}
