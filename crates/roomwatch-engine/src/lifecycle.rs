//! Room lifecycle persistence.
//!
//! One document per room, keyed by room id: created with `{username, userId,
//! startAt}` when a room starts, merged with `{endAt}` when it ends. An end
//! event for a room that was never recorded still writes a document; the end
//! timestamp is the only information available at that point.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roomwatch_core::kv::{KvStore, WritePrecondition};

use crate::config::KeyNamespace;
use crate::error::{Error, Result};

/// A room lifecycle document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRecord {
    /// Creator username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Creator user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// When the room was first observed live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    /// When the room was first observed gone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
}

/// Capability for persisting room start/end timestamps.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Records that a room started.
    ///
    /// Upserts the room's document with the creator identity and `startAt`.
    async fn record_started(
        &self,
        room_id: &str,
        username: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Records that a room ended.
    ///
    /// Merges `endAt` into the room's document, preserving existing fields.
    async fn record_ended(&self, room_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Lifecycle store persisting JSON documents in the key-value store.
pub struct KvLifecycleStore<S: KvStore + ?Sized> {
    store: Arc<S>,
    namespace: KeyNamespace,
}

impl<S: KvStore + ?Sized> KvLifecycleStore<S> {
    /// Creates a lifecycle store over the given backend.
    #[must_use]
    pub fn new(store: Arc<S>, namespace: KeyNamespace) -> Self {
        Self { store, namespace }
    }

    fn key(&self, room_id: &str) -> String {
        format!("{}/{room_id}", self.namespace.key("rooms"))
    }

    async fn load(&self, key: &str) -> Result<LifecycleRecord> {
        match self.store.get(key).await {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| {
                Error::serialization(format!("failed to deserialize lifecycle record {key}: {e}"))
            }),
            Err(roomwatch_core::Error::NotFound(_)) => Ok(LifecycleRecord::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, record: &LifecycleRecord) -> Result<()> {
        let json = serde_json::to_vec(record).map_err(|e| {
            Error::serialization(format!("failed to serialize lifecycle record {key}: {e}"))
        })?;
        self.store
            .put(key, Bytes::from(json), WritePrecondition::None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<S: KvStore + ?Sized> LifecycleStore for KvLifecycleStore<S> {
    async fn record_started(
        &self,
        room_id: &str,
        username: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let key = self.key(room_id);
        let record = LifecycleRecord {
            username: Some(username.to_string()),
            user_id: Some(user_id.to_string()),
            start_at: Some(at),
            end_at: None,
        };
        self.save(&key, &record).await
    }

    async fn record_ended(&self, room_id: &str, at: DateTime<Utc>) -> Result<()> {
        let key = self.key(room_id);
        let mut record = self.load(&key).await?;
        record.end_at = Some(at);
        self.save(&key, &record).await
    }
}

/// A recorded lifecycle call, for test inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// `record_started` was called.
    Started {
        /// Room id.
        room_id: String,
        /// Creator username.
        username: String,
    },
    /// `record_ended` was called.
    Ended {
        /// Room id.
        room_id: String,
    },
}

/// Recording lifecycle store for tests.
#[derive(Debug, Default)]
pub struct MemoryLifecycle {
    inner: Mutex<MemoryLifecycleState>,
}

#[derive(Debug, Default)]
struct MemoryLifecycleState {
    events: Vec<LifecycleEvent>,
    fail_all: bool,
}

impl MemoryLifecycle {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail.
    pub fn fail_writes(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.fail_all = true;
        }
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.inner
            .lock()
            .map(|state| state.events.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: LifecycleEvent) -> Result<()> {
        let mut state = self.inner.lock().map_err(|_| Error::Configuration(
            "memory lifecycle lock poisoned".into(),
        ))?;
        if state.fail_all {
            return Err(Error::storage("injected lifecycle failure"));
        }
        state.events.push(event);
        Ok(())
    }
}

#[async_trait]
impl LifecycleStore for MemoryLifecycle {
    async fn record_started(
        &self,
        room_id: &str,
        username: &str,
        _user_id: &str,
        _at: DateTime<Utc>,
    ) -> Result<()> {
        self.record(LifecycleEvent::Started {
            room_id: room_id.to_string(),
            username: username.to_string(),
        })
    }

    async fn record_ended(&self, room_id: &str, _at: DateTime<Utc>) -> Result<()> {
        self.record(LifecycleEvent::Ended {
            room_id: room_id.to_string(),
        })
    }
}
