//! Per-entity repositories.
//!
//! Each repository is a thin domain façade composing the generic
//! [`Repository`] over one [`StorageContext`]; none of them bypass the
//! context contract, they only add validation, default-partition
//! fallback, and entity-specific query helpers.
//!
//! [`StorageContext`]: crate::storage::StorageContext

pub mod base;
pub mod chat_message;
pub mod chat_participant;
pub mod chat_session;
pub mod user_preference;

pub use base::Repository;
pub use chat_message::ChatMessageRepository;
pub use chat_participant::ChatParticipantRepository;
pub use chat_session::ChatSessionRepository;
pub use user_preference::UserPreferenceRepository;
