//! Single-flag cycle lock over the key-value store.
//!
//! At most one reconciliation cycle runs at a time. The lock is a single
//! entry written with a `DoesNotExist` precondition; contention is a normal
//! outcome (the cycle is skipped, the next scheduled tick is the retry), so
//! [`CycleLock::try_acquire`] returns `Ok(None)` rather than an error when
//! the lock is held.
//!
//! A TTL guards against a crashed holder wedging the service: an expired
//! record is taken over with a `MatchesVersion` CAS so two racing processes
//! cannot both win the takeover.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::kv::{KvStore, WritePrecondition, WriteResult};

/// Default lock TTL (5 minutes).
///
/// Expiry exists only to recover from crashed holders; a healthy cycle
/// releases the lock when it finishes.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// Lock entry contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    /// Unique lock holder ID.
    pub holder_id: String,

    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,

    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    /// Creates a new lock record with the given holder ID and TTL.
    #[must_use]
    pub fn new(holder_id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            holder_id: holder_id.into(),
            acquired_at: now,
            expires_at: now
                + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(300)),
        }
    }

    /// Returns whether this lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Mutual-exclusion flag for reconciliation cycles.
pub struct CycleLock<S: KvStore + ?Sized> {
    store: Arc<S>,
    lock_key: String,
    holder_id: String,
    ttl: Duration,
}

// Manual Clone implementation to avoid requiring S: Clone
// (Arc<S> can be cloned regardless of whether S is Clone)
impl<S: KvStore + ?Sized> Clone for CycleLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            lock_key: self.lock_key.clone(),
            holder_id: self.holder_id.clone(),
            ttl: self.ttl,
        }
    }
}

impl<S: KvStore + ?Sized> CycleLock<S> {
    /// Creates a new cycle lock.
    ///
    /// Each lock instance gets a unique holder ID for identification.
    #[must_use]
    pub fn new(store: Arc<S>, lock_key: impl Into<String>) -> Self {
        Self {
            store,
            lock_key: lock_key.into(),
            holder_id: Ulid::new().to_string(),
            ttl: DEFAULT_LOCK_TTL,
        }
    }

    /// Sets the lock TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the holder ID for this lock instance.
    #[must_use]
    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Attempts to acquire the lock once.
    ///
    /// Returns `Ok(None)` if another holder owns a non-expired lock; the
    /// caller skips its cycle. An expired record is taken over.
    ///
    /// # Errors
    ///
    /// Returns an error on store failures or a corrupt lock record.
    pub async fn try_acquire(&self) -> Result<Option<CycleGuard<S>>> {
        let record = LockRecord::new(&self.holder_id, self.ttl);
        let record_bytes = encode_record(&record)?;

        match self
            .store
            .put(&self.lock_key, record_bytes, WritePrecondition::DoesNotExist)
            .await?
        {
            WriteResult::Success { .. } => {
                return Ok(Some(CycleGuard {
                    store: Arc::clone(&self.store),
                    lock_key: self.lock_key.clone(),
                    holder_id: self.holder_id.clone(),
                    released: false,
                }));
            }
            WriteResult::PreconditionFailed { .. } => {
                // Lock exists - check for expiry below.
            }
        }

        // Bind the takeover decision to the version observed here: if the
        // holder changes between HEAD and the CAS, the CAS fails and this
        // cycle is skipped.
        let Some(meta) = self.store.head(&self.lock_key).await? else {
            // Lock disappeared between the write and now; skip this cycle,
            // the next tick will acquire cleanly.
            return Ok(None);
        };

        let Some(existing) = self.read_record().await? else {
            return Ok(None);
        };

        if !existing.is_expired() {
            return Ok(None);
        }

        let takeover = LockRecord::new(&self.holder_id, self.ttl);
        let takeover_bytes = encode_record(&takeover)?;

        match self
            .store
            .put(
                &self.lock_key,
                takeover_bytes,
                WritePrecondition::MatchesVersion(meta.version),
            )
            .await?
        {
            WriteResult::Success { .. } => Ok(Some(CycleGuard {
                store: Arc::clone(&self.store),
                lock_key: self.lock_key.clone(),
                holder_id: self.holder_id.clone(),
                released: false,
            })),
            WriteResult::PreconditionFailed { .. } => Ok(None),
        }
    }

    /// Checks if the lock is currently held (regardless of holder).
    ///
    /// # Errors
    ///
    /// Returns an error if the lock state could not be read.
    pub async fn is_locked(&self) -> Result<bool> {
        Ok(self
            .read_record()
            .await?
            .is_some_and(|record| !record.is_expired()))
    }

    async fn read_record(&self) -> Result<Option<LockRecord>> {
        match self.store.get(&self.lock_key).await {
            Ok(data) => {
                let record: LockRecord =
                    serde_json::from_slice(&data).map_err(|e| Error::Internal {
                        message: format!("parse lock record: {e}"),
                    })?;
                Ok(Some(record))
            }
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn encode_record(record: &LockRecord) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(record).map_err(|e| {
        Error::Internal {
            message: format!("serialize lock record: {e}"),
        }
    })?))
}

/// Guard for a held cycle lock.
///
/// The engine releases the guard at the end of every cycle, success or
/// failure. Dropping without release leaves the record to expire via TTL.
pub struct CycleGuard<S: KvStore + ?Sized> {
    store: Arc<S>,
    lock_key: String,
    holder_id: String,
    released: bool,
}

impl<S: KvStore + ?Sized> CycleGuard<S> {
    /// Returns the holder ID for this guard.
    #[must_use]
    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Releases the lock.
    ///
    /// Deletes the lock entry after verifying the record still names this
    /// holder and has not expired. An expired own record is never deleted:
    /// a takeover may already be in flight, and a leftover expired record is
    /// reclaimed by the next acquire. The read and the delete are separate
    /// store calls, so a takeover racing the exact expiry boundary can still
    /// lose its record; acquire recovers via the TTL path.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock state could not be read or deleted.
    pub async fn release(mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let current = match self.store.get(&self.lock_key).await {
            Ok(data) => serde_json::from_slice::<LockRecord>(&data).ok(),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        match current {
            Some(record) if record.holder_id == self.holder_id && !record.is_expired() => {
                self.store.delete(&self.lock_key).await
            }
            _ => Ok(()),
        }
    }
}
