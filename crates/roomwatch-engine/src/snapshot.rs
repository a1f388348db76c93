//! Per-creator snapshot persistence.
//!
//! Snapshots are JSON room lists keyed by the creator's canonical snapshot
//! key. A missing entry is an empty list, never an error; a write failure
//! always propagates so a cycle can't mistake a lost snapshot for success.

use std::sync::Arc;

use bytes::Bytes;
use roomwatch_core::kv::{KvStore, WritePrecondition};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::room::RoomList;

/// Durable store of last-known room lists, one entry per creator.
pub struct SnapshotStore<S: KvStore + ?Sized> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: KvStore + ?Sized> Clone for SnapshotStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: KvStore + ?Sized> SnapshotStore<S> {
    /// Creates a snapshot store over the given backend.
    #[must_use]
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Loads the previous snapshot for a creator.
    ///
    /// A missing entry yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures or a corrupt snapshot.
    pub async fn load(&self, snapshot_key: &str) -> Result<RoomList> {
        let key = self.config.state_key(snapshot_key);
        match self.store.get(&key).await {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| {
                Error::serialization(format!("failed to deserialize snapshot {key}: {e}"))
            }),
            Err(roomwatch_core::Error::NotFound(_)) => Ok(RoomList::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores the new snapshot for a creator, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store write fails.
    pub async fn store(&self, snapshot_key: &str, rooms: &RoomList) -> Result<()> {
        let key = self.config.state_key(snapshot_key);
        let json = serde_json::to_vec(rooms).map_err(|e| {
            Error::serialization(format!("failed to serialize snapshot {key}: {e}"))
        })?;

        self.store
            .put(&key, Bytes::from(json), WritePrecondition::None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Room;
    use roomwatch_core::MemoryKv;

    fn store() -> SnapshotStore<MemoryKv> {
        SnapshotStore::new(Arc::new(MemoryKv::new()), EngineConfig::default())
    }

    #[tokio::test]
    async fn missing_snapshot_is_empty_list() {
        let snapshots = store();
        let list = snapshots.load("alice").await.expect("load");
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn store_then_load_roundtrips() {
        let snapshots = store();
        let rooms = RoomList::from_rooms(vec![Room::new("a"), Room::new("b")]);
        snapshots.store("alice", &rooms).await.expect("store");

        let loaded = snapshots.load("alice").await.expect("load");
        assert_eq!(loaded.data.len(), 2);
        assert!(loaded.contains_id("a"));
        assert!(loaded.contains_id("b"));
    }

    #[tokio::test]
    async fn creators_have_distinct_keys() {
        let snapshots = store();
        snapshots
            .store("alice", &RoomList::from_rooms(vec![Room::new("a")]))
            .await
            .expect("store");

        let other = snapshots.load("bob").await.expect("load");
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_an_error() {
        let kv = Arc::new(MemoryKv::new());
        let config = EngineConfig::default();
        kv.put(
            &config.state_key("alice"),
            Bytes::from("not-json"),
            WritePrecondition::None,
        )
        .await
        .expect("put");

        let snapshots = SnapshotStore::new(kv, config);
        let err = snapshots.load("alice").await.unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }
}
