//! Storage backend configuration.
//!
//! Deserialized from `storage.toml` by the loader in `parley-infra`. The
//! `backend` tag selects one of the three storage contexts for the whole
//! deployment.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

/// Which backing store to use, with its backend-specific settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process map, reset on restart. Ephemeral/test/demo deployments.
    Volatile,

    /// One JSON document per container under `data_dir`. Small and dev
    /// deployments only: every mutation rewrites the whole document.
    Filesystem(FilesystemStoreConfig),

    /// Azure Cosmos DB, one container per entity type.
    Cosmos(CosmosStoreConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Volatile
    }
}

/// Settings for the filesystem backend.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesystemStoreConfig {
    /// Directory holding the per-container JSON documents.
    pub data_dir: PathBuf,
}

/// Settings for the Cosmos DB backend.
#[derive(Debug, Clone, Deserialize)]
pub struct CosmosStoreConfig {
    /// Account endpoint, e.g. `https://myaccount.documents.azure.com`.
    pub endpoint: String,
    /// Base64-encoded master key. Never logged.
    pub key: SecretString,
    /// Database name holding the chat containers.
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_volatile() {
        let config: StoreConfig = toml::from_str(r#"backend = "volatile""#).unwrap();
        assert!(matches!(config, StoreConfig::Volatile));
    }

    #[test]
    fn parses_filesystem() {
        let config: StoreConfig = toml::from_str(
            r#"
backend = "filesystem"
data_dir = "/var/lib/parley"
"#,
        )
        .unwrap();
        match config {
            StoreConfig::Filesystem(fs) => {
                assert_eq!(fs.data_dir, PathBuf::from("/var/lib/parley"));
            }
            other => panic!("expected filesystem config, got {other:?}"),
        }
    }

    #[test]
    fn parses_cosmos() {
        let config: StoreConfig = toml::from_str(
            r#"
backend = "cosmos"
endpoint = "https://example.documents.azure.com"
key = "c2VjcmV0"
database = "parley"
"#,
        )
        .unwrap();
        match config {
            StoreConfig::Cosmos(cosmos) => {
                assert_eq!(cosmos.database, "parley");
                // SecretString must not leak through Debug.
                assert!(!format!("{cosmos:?}").contains("c2VjcmV0"));
            }
            other => panic!("expected cosmos config, got {other:?}"),
        }
    }
}
