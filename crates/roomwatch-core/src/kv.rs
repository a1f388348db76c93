//! Key-value store capability with conditional writes.
//!
//! Roomwatch keeps its cross-cycle state (room snapshots, the cycle lock,
//! lifecycle documents) behind this trait so the engine never depends on a
//! concrete store client. Production deployments plug in a Redis- or
//! document-store-backed implementation; tests and the default runner use
//! [`MemoryKv`].
//!
//! Conditional writes are part of the contract: the cycle lock relies on
//! `DoesNotExist` / `MatchesVersion` preconditions being atomic at the store
//! level. A failed precondition is a normal result, never an error.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Precondition for conditional writes.
///
/// The version token is opaque; backends interpret it according to their own
/// semantics (numeric generation, etag, fencing counter).
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if the entry does not exist.
    DoesNotExist,
    /// Write only if the entry's version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns the new version token.
    Success {
        /// The new version token after the write.
        version: String,
    },
    /// Precondition failed, returns the current version token.
    PreconditionFailed {
        /// The version that caused the precondition to fail.
        current_version: String,
    },
}

/// Metadata about a stored entry.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    /// Entry key.
    pub key: String,
    /// Entry version token for conditional writes.
    pub version: String,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Key-value store trait.
///
/// All backing stores (Redis, document store, memory) implement this trait.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Reads an entry.
    ///
    /// Returns `Error::NotFound` if the entry doesn't exist.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Writes an entry with an optional precondition.
    ///
    /// Returns `WriteResult::PreconditionFailed` if the precondition is not
    /// met. Never returns an error for precondition failure.
    async fn put(&self, key: &str, data: Bytes, precondition: WritePrecondition)
        -> Result<WriteResult>;

    /// Deletes an entry.
    ///
    /// Succeeds even if the entry doesn't exist (idempotent).
    async fn delete(&self, key: &str) -> Result<()>;

    /// Gets entry metadata without reading the value.
    ///
    /// Returns `None` if the entry doesn't exist.
    async fn head(&self, key: &str) -> Result<Option<EntryMeta>>;
}

/// In-memory key-value store for testing and single-process deployments.
///
/// Thread-safe via `RwLock`. Uses numeric versions internally (stored as
/// strings) to exercise the same conditional-write paths as real backends.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
    failing_prefixes: Arc<RwLock<Vec<String>>>,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    data: Bytes,
    version: i64,
    last_modified: DateTime<Utc>,
}

impl MemoryKv {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_entries()?.len())
    }

    /// Returns whether the store holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_entries()?.is_empty())
    }

    /// Makes subsequent writes to keys starting with `key_prefix` fail.
    ///
    /// Reads and deletes are unaffected. Used to exercise write-failure
    /// paths in tests.
    pub fn fail_writes_to(&self, key_prefix: &str) {
        if let Ok(mut prefixes) = self.failing_prefixes.write() {
            prefixes.push(key_prefix.to_string());
        }
    }

    fn read_entries(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, StoredEntry>>> {
        self.entries.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Bytes> {
        self.read_entries()?
            .get(key)
            .map(|e| e.data.clone())
            .ok_or_else(|| Error::NotFound(format!("entry not found: {key}")))
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let failing = self
            .failing_prefixes
            .read()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()));
        if failing {
            return Err(Error::storage(format!("injected write failure: {key}")));
        }

        let mut entries = self.entries.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let current = entries.get(key);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(entry) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: entry.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => {
                let expected_num: i64 = expected.parse().unwrap_or(-1);
                match current {
                    Some(entry) if entry.version != expected_num => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: entry.version.to_string(),
                        });
                    }
                    None => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: "0".to_string(),
                        });
                    }
                    _ => {}
                }
            }
            WritePrecondition::None => {}
        }

        let new_version = current.map_or(1, |e| e.version + 1);
        entries.insert(
            key.to_string(),
            StoredEntry {
                data,
                version: new_version,
                last_modified: Utc::now(),
            },
        );
        drop(entries);

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .remove(key);
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<EntryMeta>> {
        Ok(self.read_entries()?.get(key).map(|e| EntryMeta {
            key: key.to_string(),
            version: e.version.to_string(),
            last_modified: Some(e.last_modified),
        }))
    }
}
