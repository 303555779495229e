//! The capability every stored record must satisfy.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Minimal shape of a persisted record: a globally unique id plus a
/// partition key used to co-locate related entities.
///
/// Both values are immutable after creation. The partition is derived
/// deterministically from domain fields (a message's partition is its chat
/// id, a preference's partition is its user id, a session partitions on
/// its own id).
///
/// Entities serialize with camelCase field names; the same projection is
/// used for the cloud wire format, the on-disk JSON documents, and
/// structured filter evaluation.
pub trait StorageEntity:
    Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Unique id within this entity type's collection. Must be non-empty
    /// for every create/upsert/delete.
    fn id(&self) -> &str;

    /// Partition key scoping partitioned queries.
    fn partition(&self) -> &str;
}
