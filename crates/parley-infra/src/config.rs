//! Storage configuration loader.
//!
//! Reads `storage.toml` from the data directory and deserializes it into
//! [`StoreConfig`]. A missing file falls back to the volatile backend; a
//! file that exists but cannot be read or parsed is a hard error, because
//! silently downgrading a persistent deployment to in-memory storage
//! would lose data without anyone noticing.

use std::path::Path;

use tracing::debug;

use parley_types::config::StoreConfig;
use parley_types::error::StorageError;

/// File name looked up inside the data directory.
pub const STORAGE_CONFIG_FILE: &str = "storage.toml";

/// Load the storage configuration from `{data_dir}/storage.toml`.
pub async fn load_store_config(data_dir: &Path) -> Result<StoreConfig, StorageError> {
    let path = data_dir.join(STORAGE_CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no storage config found, using volatile backend");
            return Ok(StoreConfig::default());
        }
        Err(err) => {
            return Err(StorageError::Backend(format!(
                "failed to read {}: {err}",
                path.display()
            )));
        }
    };

    toml::from_str(&content)
        .map_err(|e| StorageError::Corrupt(format!("failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_defaults_to_volatile() {
        let tmp = TempDir::new().unwrap();
        let config = load_store_config(tmp.path()).await.unwrap();
        assert!(matches!(config, StoreConfig::Volatile));
    }

    #[tokio::test]
    async fn filesystem_config_parses() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(STORAGE_CONFIG_FILE),
            "backend = \"filesystem\"\ndata_dir = \"/tmp/parley\"\n",
        )
        .await
        .unwrap();

        let config = load_store_config(tmp.path()).await.unwrap();
        assert!(matches!(config, StoreConfig::Filesystem(_)));
    }

    #[tokio::test]
    async fn unparsable_file_is_a_hard_error() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(STORAGE_CONFIG_FILE), "backend = [broken")
            .await
            .unwrap();

        let err = load_store_config(tmp.path()).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }
}
