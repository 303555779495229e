//! Storage error taxonomy.
//!
//! Every backend-native failure (HTTP status, I/O error, serde error) is
//! translated into [`StorageError`] at the storage context boundary;
//! repositories and their callers never see backend types.

use thiserror::Error;

/// Errors surfaced by storage contexts and repositories.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Malformed input, e.g. an empty entity id or an unparsable
    /// continuation token. Local, never worth retrying.
    #[error("validation error: {0}")]
    Validation(String),

    /// The entity does not exist in the given partition. An expected
    /// outcome for reads and deletes, not a fault.
    #[error("entity not found")]
    NotFound,

    /// A create targeted an id already present in the collection. The
    /// caller can switch to upsert.
    #[error("entity already exists")]
    AlreadyExists,

    /// Connectivity or availability problem from the cloud backend.
    /// Retry policy belongs to the caller; the storage layer never
    /// retries on its own.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// Persisted state could not be parsed. Fatal for the context
    /// instance; no auto-repair.
    #[error("corrupt persisted state: {0}")]
    Corrupt(String),

    /// Non-retryable backend fault, e.g. rejected credentials or a
    /// malformed request.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        StorageError::Validation(message.into())
    }
}
