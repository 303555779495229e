//! File-backed storage context.
//!
//! Holds the full entity set in a concurrent map mirrored to a single
//! JSON document on disk, shaped `{ "<id>": { ...entity... } }`. Every
//! mutation rewrites the whole document, which costs O(total entities)
//! of I/O per write. That ceiling is accepted: this backend exists for
//! small and dev deployments where durability matters more than
//! throughput. Queries read the in-memory map and never touch disk.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tracing::debug;

use parley_core::storage::context::{StorageContext, ensure_entity_id};
use parley_core::storage::mem;
use parley_core::storage::query::{ContinuationToken, Filter, Page, QuerySpec};
use parley_types::entity::StorageEntity;
use parley_types::error::StorageError;

/// How to roll the in-memory map back if the disk flush fails, so the
/// map never advertises state the file does not hold.
enum Undo<E> {
    Remove(String),
    Restore(String, E),
}

impl<E: StorageEntity> Undo<E> {
    fn apply(self, entities: &DashMap<String, E>) {
        match self {
            Undo::Remove(id) => {
                entities.remove(&id);
            }
            Undo::Restore(id, previous) => {
                entities.insert(id, previous);
            }
        }
    }
}

/// A storage context persisted to one JSON document.
pub struct FileSystemContext<E: StorageEntity> {
    entities: Arc<DashMap<String, E>>,
    path: Arc<PathBuf>,
    /// Serializes every (mutate map, rewrite file) sequence. Never held
    /// across anything but this context's own file I/O.
    file_lock: Arc<Mutex<()>>,
}

impl<E: StorageEntity> FileSystemContext<E> {
    /// Open a context against a container file, creating parent
    /// directories and an empty `{}` document when absent.
    ///
    /// An existing file that does not parse is [`StorageError::Corrupt`]:
    /// the context refuses to start rather than silently discard data.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| io_error(&path, e))?;
        }

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::write(&path, b"{}").await.map_err(|e| io_error(&path, e))?;
                b"{}".to_vec()
            }
            Err(err) => return Err(io_error(&path, err)),
        };

        let loaded: HashMap<String, E> = serde_json::from_slice(&raw)
            .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), entities = loaded.len(), "loaded container file");

        let entities = DashMap::new();
        for (id, entity) in loaded {
            entities.insert(id, entity);
        }

        Ok(Self {
            entities: Arc::new(entities),
            path: Arc::new(path),
            file_lock: Arc::new(Mutex::new(())),
        })
    }

    fn snapshot(&self) -> Vec<E> {
        self.entities.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Apply a map mutation and rewrite the container file as one unit.
    ///
    /// The whole sequence runs on a spawned task that owns the file
    /// lock, so a caller dropping its future mid-operation (cancellation)
    /// lets the flush complete instead of abandoning a half-applied
    /// mutation. If the flush itself fails, the map change is undone.
    async fn mutate<F>(&self, op: F) -> Result<(), StorageError>
    where
        F: FnOnce(&DashMap<String, E>) -> Result<Undo<E>, StorageError> + Send + 'static,
    {
        let guard = Arc::clone(&self.file_lock).lock_owned().await;
        let entities = Arc::clone(&self.entities);
        let path = Arc::clone(&self.path);

        let task = tokio::spawn(async move {
            let _guard = guard;
            let undo = op(&entities)?;
            match flush(&entities, &path).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    undo.apply(&entities);
                    Err(err)
                }
            }
        });

        task.await
            .map_err(|e| StorageError::Backend(format!("storage task failed: {e}")))?
    }
}

/// Serialize the whole map and swap it into place atomically via a
/// temp-file rename, so the real file is never observable half-written.
async fn flush<E: StorageEntity>(
    entities: &DashMap<String, E>,
    path: &PathBuf,
) -> Result<(), StorageError> {
    let snapshot: BTreeMap<String, E> = entities
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();
    let bytes = serde_json::to_vec(&snapshot)
        .map_err(|e| StorageError::Backend(format!("failed to serialize container: {e}")))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::Backend(format!("invalid container path {}", path.display())))?;
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    tokio::fs::write(&tmp, &bytes).await.map_err(|e| io_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| io_error(path, e))?;
    Ok(())
}

fn io_error(path: &std::path::Path, err: std::io::Error) -> StorageError {
    StorageError::Backend(format!("file i/o error at {}: {err}", path.display()))
}

impl<E: StorageEntity> StorageContext<E> for FileSystemContext<E> {
    async fn create(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        let entity = entity.clone();
        self.mutate(move |entities| match entities.entry(entity.id().to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists),
            Entry::Vacant(slot) => {
                let id = entity.id().to_string();
                slot.insert(entity);
                Ok(Undo::Remove(id))
            }
        })
        .await
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
        let entity = entity.clone();
        self.mutate(move |entities| {
            let id = entity.id().to_string();
            match entities.insert(id.clone(), entity) {
                Some(previous) => Ok(Undo::Restore(id, previous)),
                None => Ok(Undo::Remove(id)),
            }
        })
        .await
    }

    async fn delete(&self, entity: &E) -> Result<(), StorageError> {
        ensure_entity_id(entity.id())?;
        let id = entity.id().to_string();
        self.mutate(move |entities| match entities.remove(&id) {
            Some((id, previous)) => Ok(Undo::Restore(id, previous)),
            None => Err(StorageError::NotFound),
        })
        .await
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

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::preference::UserPreference;
    use tempfile::TempDir;

    fn preference(user_id: &str, dark_mode: bool) -> UserPreference {
        let mut pref = UserPreference::new(user_id);
        pref.dark_mode = dark_mode;
        pref
    }

    #[tokio::test]
    async fn open_creates_empty_container_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store").join("user_preferences.json");
        let _context = FileSystemContext::<UserPreference>::open(&path).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw, "{}");
    }

    #[tokio::test]
    async fn upsert_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_preferences.json");

        let context = FileSystemContext::open(&path).await.unwrap();
        context.upsert(&preference("u1", true)).await.unwrap();
        drop(context);

        // Simulated process restart: a fresh context against the same file.
        let reopened = FileSystemContext::<UserPreference>::open(&path).await.unwrap();
        let found = reopened.read("u1", "u1").await.unwrap();
        assert!(found.dark_mode);
    }

    #[tokio::test]
    async fn delete_is_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_preferences.json");

        let context = FileSystemContext::open(&path).await.unwrap();
        let pref = preference("u1", false);
        context.create(&pref).await.unwrap();
        context.delete(&pref).await.unwrap();
        drop(context);

        let reopened = FileSystemContext::<UserPreference>::open(&path).await.unwrap();
        assert!(matches!(reopened.read("u1", "u1").await, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn duplicate_create_leaves_map_and_file_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_preferences.json");

        let context = FileSystemContext::open(&path).await.unwrap();
        context.create(&preference("u1", true)).await.unwrap();

        let err = context.create(&preference("u1", false)).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists));

        let reopened = FileSystemContext::<UserPreference>::open(&path).await.unwrap();
        let found = reopened.read("u1", "u1").await.unwrap();
        assert!(found.dark_mode);
    }

    #[tokio::test]
    async fn corrupt_container_file_fails_loudly() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_preferences.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        assert!(matches!(
            FileSystemContext::<UserPreference>::open(&path).await,
            Err(StorageError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn failed_flush_rolls_the_map_back() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("store");
        let path = dir.join("user_preferences.json");

        let context = FileSystemContext::open(&path).await.unwrap();
        context.create(&preference("u1", true)).await.unwrap();

        // Take the container directory away so the next flush cannot
        // write its temp file.
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        let err = context.create(&preference("u2", false)).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));

        // The map must not advertise what the file never held.
        assert!(matches!(context.read("u2", "u2").await, Err(StorageError::NotFound)));
        let found = context.read("u1", "u1").await.unwrap();
        assert!(found.dark_mode);
    }

    #[tokio::test]
    async fn dropped_caller_still_flushes_to_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_preferences.json");
        let context = FileSystemContext::open(&path).await.unwrap();

        {
            let pref = preference("u1", true);
            let mut fut = Box::pin(context.upsert(&pref));
            // One poll takes the uncontended lock and spawns the
            // mutation task; dropping the future after that models a
            // caller cancelled mid-operation.
            std::future::poll_fn(|cx| {
                let _ = fut.as_mut().poll(cx);
                std::task::Poll::Ready(())
            })
            .await;
        }

        // The spawned task owns the lock and finishes on its own.
        let mut doc = serde_json::Value::Null;
        for _ in 0..50 {
            let raw = tokio::fs::read(&path).await.unwrap();
            doc = serde_json::from_slice(&raw).unwrap();
            if doc.get("u1").is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert_eq!(doc["u1"]["darkMode"], serde_json::json!(true));
        let found = context.read("u1", "u1").await.unwrap();
        assert!(found.dark_mode);
    }

    #[tokio::test]
    async fn container_file_holds_id_keyed_entities() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_preferences.json");

        let context = FileSystemContext::open(&path).await.unwrap();
        context.upsert(&preference("u1", true)).await.unwrap();
        context.upsert(&preference("u2", false)).await.unwrap();

        let raw = tokio::fs::read(&path).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(doc["u1"]["darkMode"], serde_json::json!(true));
        assert_eq!(doc["u2"]["userId"], serde_json::json!("u2"));
    }

    #[tokio::test]
    async fn paged_query_reads_from_memory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("user_preferences.json");

        let context = FileSystemContext::open(&path).await.unwrap();
        for i in 0..7 {
            context.upsert(&preference(&format!("u{i}"), false)).await.unwrap();
        }

        let first = context
            .query_paged(QuerySpec::all().in_partition("u3"), 5, None)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 1);
        assert!(first.continuation.is_none());

        let all = context.query(QuerySpec::all()).await.unwrap();
        assert_eq!(all.len(), 7);
    }
}
