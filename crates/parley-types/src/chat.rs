//! Chat session, message, and participant types.
//!
//! All three implement [`StorageEntity`] and serialize with camelCase
//! field names to match the cloud wire contract.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::StorageEntity;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorRole {
    User,
    Bot,
}

impl fmt::Display for AuthorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorRole::User => write!(f, "user"),
            AuthorRole::Bot => write!(f, "bot"),
        }
    }
}

impl FromStr for AuthorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(AuthorRole::User),
            "bot" => Ok(AuthorRole::Bot),
            other => Err(format!("invalid author role: '{other}'")),
        }
    }
}

/// A chat session.
///
/// Sessions are self-partitioned: the partition key is the session's own
/// id, so point reads default the partition to the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    /// System description fed to the model at the start of the chat.
    pub system_description: String,
    /// Relative balance between recent history and long-term memory,
    /// in `[0.0, 1.0]`.
    pub memory_balance: f64,
    pub enabled_plugins: Vec<String>,
    pub created_on: DateTime<Utc>,
}

impl ChatSession {
    /// Create a new session with a fresh id and the current timestamp.
    pub fn new(title: impl Into<String>, system_description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            system_description: system_description.into(),
            memory_balance: 0.5,
            enabled_plugins: Vec::new(),
            created_on: Utc::now(),
        }
    }
}

impl StorageEntity for ChatSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn partition(&self) -> &str {
        &self.id
    }
}

/// A single message within a chat.
///
/// Messages partition on their chat id and sort on `timestamp`, which is
/// monotonically increasing within a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub author_role: AuthorRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new message with a fresh id and the current timestamp.
    pub fn new(
        chat_id: impl Into<String>,
        author_role: AuthorRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            author_role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

impl StorageEntity for ChatMessage {
    fn id(&self) -> &str {
        &self.id
    }

    fn partition(&self) -> &str {
        &self.chat_id
    }
}

/// Membership of one user in one chat.
///
/// A user can be part of multiple chats, so one user maps to many
/// participants. The natural partition is the user id; chat-scoped
/// lookups go cross-partition with a chat-id filter instead of
/// maintaining a second index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParticipant {
    pub id: String,
    pub user_id: String,
    pub chat_id: String,
    pub last_modified: DateTime<Utc>,
}

impl ChatParticipant {
    /// Create a new participant with a fresh id and the current timestamp.
    pub fn new(user_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            last_modified: Utc::now(),
        }
    }
}

impl StorageEntity for ChatParticipant {
    fn id(&self) -> &str {
        &self.id
    }

    fn partition(&self) -> &str {
        &self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_role_roundtrip() {
        assert_eq!("user".parse::<AuthorRole>().unwrap(), AuthorRole::User);
        assert_eq!("Bot".parse::<AuthorRole>().unwrap(), AuthorRole::Bot);
        assert!("assistant".parse::<AuthorRole>().is_err());
        assert_eq!(AuthorRole::Bot.to_string(), "bot");
    }

    #[test]
    fn session_partitions_on_own_id() {
        let session = ChatSession::new("Test chat", "You are helpful.");
        assert_eq!(session.partition(), session.id());
    }

    #[test]
    fn message_partitions_on_chat_id() {
        let message = ChatMessage::new("chat-1", AuthorRole::User, "hello");
        assert_eq!(message.partition(), "chat-1");
        assert!(!message.id().is_empty());
    }

    #[test]
    fn message_serializes_with_wire_names() {
        let message = ChatMessage::new("chat-1", AuthorRole::User, "hello");
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("chatId").is_some());
        assert!(value.get("authorRole").is_some());
        assert!(value.get("chat_id").is_none());
    }

    #[test]
    fn participant_partitions_on_user_id() {
        let participant = ChatParticipant::new("user-1", "chat-1");
        assert_eq!(participant.partition(), "user-1");
    }
}
