//! The reconciliation engine.
//!
//! One cycle: acquire the lock, fan out one task per creator (resolve,
//! fetch, diff against the stored snapshot, dispatch side effects, persist
//! the new snapshot), wait for every task to settle, release the lock.
//!
//! Isolation rules, in order of blast radius:
//!
//! - a failed notification or lifecycle write is absorbed into counts and
//!   never fails the creator;
//! - a failed resolve/fetch/snapshot operation fails that creator only and
//!   leaves its snapshot untouched;
//! - lock contention skips the whole cycle without touching any state.
//!
//! The lock is released in every path once acquired, including when a
//! creator task panics.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::Instrument;

use roomwatch_core::kv::KvStore;
use roomwatch_core::lock::CycleLock;
use roomwatch_core::observability::{creator_span, cycle_span};

use crate::config::EngineConfig;
use crate::diff::diff_rooms;
use crate::endpoint::EndpointDirectory;
use crate::error::{Error, Result};
use crate::lifecycle::LifecycleStore;
use crate::metrics::EngineMetrics;
use crate::notify::{DispatchOutcome, Notification, Notifier};
use crate::room::{CreatorRef, ResolvedCreator, Room, RoomDelta};
use crate::snapshot::SnapshotStore;
use crate::source::RoomSource;

/// Overall outcome of one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle ran to completion (individual creators may still have failed).
    Completed,
    /// Another cycle held the lock; nothing was read, written, or dispatched.
    SkippedLockHeld,
}

/// Per-creator result within a cycle.
#[derive(Debug, Clone)]
pub struct CreatorOutcome {
    /// The creator reference as given in the target list.
    pub creator: CreatorRef,
    /// What happened to this creator.
    pub status: CreatorStatus,
}

/// Status of one creator's processing.
#[derive(Debug, Clone)]
pub enum CreatorStatus {
    /// The creator was processed and its snapshot committed.
    Processed {
        /// Resolved username.
        username: String,
        /// The computed delta for this cycle.
        delta: RoomDelta,
        /// Aggregated notification delivery counts.
        notifications: DispatchOutcome,
        /// Number of lifecycle records written.
        lifecycle_recorded: usize,
        /// Number of lifecycle writes that failed.
        lifecycle_failed: usize,
    },
    /// The creator was skipped this cycle; its snapshot is untouched.
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl CreatorStatus {
    /// Returns whether the creator was processed.
    #[must_use]
    pub const fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Report of one reconciliation cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Overall cycle outcome.
    pub outcome: CycleOutcome,
    /// Per-creator outcomes, in target order. Empty when skipped.
    pub creators: Vec<CreatorOutcome>,
}

impl CycleReport {
    /// Creates a skipped-cycle report.
    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            outcome: CycleOutcome::SkippedLockHeld,
            creators: Vec::new(),
        }
    }

    /// Returns whether the cycle was skipped for lock contention.
    #[must_use]
    pub fn was_skipped(&self) -> bool {
        self.outcome == CycleOutcome::SkippedLockHeld
    }

    /// Returns the number of creators processed successfully.
    #[must_use]
    pub fn processed_count(&self) -> usize {
        self.creators
            .iter()
            .filter(|c| c.status.is_processed())
            .count()
    }

    /// Returns the number of creators that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.creators.len() - self.processed_count()
    }
}

/// Side-effect counts for one delta entry.
#[derive(Debug, Clone, Copy, Default)]
struct SideEffectCounts {
    notifications: DispatchOutcome,
    lifecycle_recorded: usize,
    lifecycle_failed: usize,
}

impl SideEffectCounts {
    fn absorb(&mut self, other: Self) {
        self.notifications.absorb(other.notifications);
        self.lifecycle_recorded += other.lifecycle_recorded;
        self.lifecycle_failed += other.lifecycle_failed;
    }
}

/// The capability bundle cloned into each per-creator task.
struct Worker<S: KvStore + ?Sized> {
    source: Arc<dyn RoomSource>,
    directory: Arc<dyn EndpointDirectory>,
    notifier: Arc<dyn Notifier>,
    lifecycle: Arc<dyn LifecycleStore>,
    snapshots: SnapshotStore<S>,
    config: EngineConfig,
    metrics: EngineMetrics,
}

impl<S: KvStore + ?Sized> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            directory: Arc::clone(&self.directory),
            notifier: Arc::clone(&self.notifier),
            lifecycle: Arc::clone(&self.lifecycle),
            snapshots: self.snapshots.clone(),
            config: self.config.clone(),
            metrics: self.metrics,
        }
    }
}

/// State-reconciliation and notification-dispatch engine.
///
/// All collaborators are injected as capabilities so tests can substitute
/// in-memory implementations for the platform API, the endpoint directory,
/// the webhook transport, and the stores.
pub struct ReconcileEngine<S: KvStore + ?Sized> {
    worker: Worker<S>,
    lock: CycleLock<S>,
}

impl<S: KvStore + ?Sized> ReconcileEngine<S> {
    /// Creates an engine over the given store and capabilities.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        source: Arc<dyn RoomSource>,
        directory: Arc<dyn EndpointDirectory>,
        notifier: Arc<dyn Notifier>,
        lifecycle: Arc<dyn LifecycleStore>,
        config: EngineConfig,
    ) -> Self {
        let lock = CycleLock::new(Arc::clone(&store), config.lock_key())
            .with_ttl(config.lock_ttl);
        let snapshots = SnapshotStore::new(store, config.clone());

        Self {
            worker: Worker {
                source,
                directory,
                notifier,
                lifecycle,
                snapshots,
                config,
                metrics: EngineMetrics::new(),
            },
            lock,
        }
    }

    /// Runs one reconciliation cycle over the given targets.
    ///
    /// Returns a skipped report without touching any state when another
    /// cycle holds the lock. Per-creator failures are captured in the
    /// report, never raised; the lock is released on every path.
    ///
    /// # Errors
    ///
    /// Returns an error if `targets` is empty or the lock store fails.
    pub async fn run_cycle(&self, targets: &[CreatorRef]) -> Result<CycleReport> {
        if targets.is_empty() {
            return Err(Error::InvalidInput(
                "target creator list is empty".to_string(),
            ));
        }

        let guard = match self.lock.try_acquire().await {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                tracing::info!("another cycle holds the lock; skipping");
                self.worker.metrics.record_cycle("skipped");
                return Ok(CycleReport::skipped());
            }
            Err(e) => {
                self.worker.metrics.record_cycle("failed");
                return Err(e.into());
            }
        };

        let span = cycle_span(guard.holder_id());
        let report = self.process_targets(targets).instrument(span).await;

        // Guaranteed cleanup: the lock is released whatever happened above.
        if let Err(e) = guard.release().await {
            tracing::error!(error = %e, "failed to release cycle lock");
        }

        self.worker.metrics.record_cycle("completed");
        self.worker
            .metrics
            .set_creators_last_cycle(report.processed_count());

        Ok(report)
    }

    /// Fans out one task per creator and waits for all of them to settle.
    async fn process_targets(&self, targets: &[CreatorRef]) -> CycleReport {
        let mut tasks: JoinSet<(usize, CreatorOutcome)> = JoinSet::new();

        for (index, creator) in targets.iter().cloned().enumerate() {
            let worker = self.worker.clone();
            tasks.spawn(async move {
                let status = process_creator(&worker, &creator).await;
                (index, CreatorOutcome { creator, status })
            });
        }

        let mut outcomes: Vec<(usize, CreatorOutcome)> = Vec::with_capacity(targets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => outcomes.push(entry),
                Err(e) => {
                    // A panicked creator task must not abort the cycle; the
                    // remaining tasks keep running and the lock still gets
                    // released. The panicked slot is backfilled below.
                    tracing::error!(error = %e, "creator task aborted");
                }
            }
        }

        // A panicked task never returned its slot; report it as failed
        // instead of dropping it from the report.
        if outcomes.len() < targets.len() {
            let seen: HashSet<usize> = outcomes.iter().map(|(index, _)| *index).collect();
            for (index, creator) in targets.iter().enumerate() {
                if !seen.contains(&index) {
                    outcomes.push((
                        index,
                        CreatorOutcome {
                            creator: creator.clone(),
                            status: CreatorStatus::Failed {
                                message: "creator task aborted".to_string(),
                            },
                        },
                    ));
                }
            }
        }

        // Report in target order regardless of completion order.
        outcomes.sort_by_key(|(index, _)| *index);

        let creators: Vec<CreatorOutcome> =
            outcomes.into_iter().map(|(_, outcome)| outcome).collect();

        for outcome in &creators {
            match &outcome.status {
                CreatorStatus::Processed {
                    username,
                    delta,
                    notifications,
                    ..
                } => {
                    tracing::info!(
                        username = username.as_str(),
                        created = delta.created.len(),
                        removed = delta.removed.len(),
                        delivered = notifications.delivered,
                        failed = notifications.failed,
                        "processed creator"
                    );
                }
                CreatorStatus::Failed { message } => {
                    tracing::warn!(
                        creator = %outcome.creator,
                        message = message.as_str(),
                        "creator skipped this cycle"
                    );
                }
            }
        }

        CycleReport {
            outcome: CycleOutcome::Completed,
            creators,
        }
    }
}

/// Processes one creator: resolve, fetch, diff, dispatch, commit snapshot.
///
/// Any failure before the snapshot write leaves the stored snapshot
/// untouched; side-effect failures are absorbed into counts.
async fn process_creator<S: KvStore + ?Sized>(
    worker: &Worker<S>,
    creator: &CreatorRef,
) -> CreatorStatus {
    let resolved = match worker.source.resolve(creator).await {
        Ok(resolved) => resolved,
        Err(e) => {
            return CreatorStatus::Failed {
                message: e.to_string(),
            }
        }
    };

    let span = creator_span(&resolved.username);

    async {
        let current = match worker.source.rooms_by_creator(&resolved).await {
            Ok(rooms) => rooms,
            Err(e) => {
                return CreatorStatus::Failed {
                    message: e.to_string(),
                }
            }
        };

        let snapshot_key = resolved.snapshot_key();
        let previous = match worker.snapshots.load(&snapshot_key).await {
            Ok(list) => list,
            Err(e) => {
                return CreatorStatus::Failed {
                    message: e.to_string(),
                }
            }
        };

        let delta = diff_rooms(&previous, &current);
        let counts = dispatch_delta(worker, &resolved, &delta).await;

        // The snapshot commit happens only after every delta side effect
        // has been dispatched, so the next cycle diffs against what this
        // cycle observed.
        if let Err(e) = worker.snapshots.store(&snapshot_key, &current).await {
            return CreatorStatus::Failed {
                message: format!("snapshot write failed: {e}"),
            };
        }

        CreatorStatus::Processed {
            username: resolved.username.clone(),
            delta,
            notifications: counts.notifications,
            lifecycle_recorded: counts.lifecycle_recorded,
            lifecycle_failed: counts.lifecycle_failed,
        }
    }
    .instrument(span)
    .await
}

/// Dispatches side effects for every delta entry and waits for all of them
/// to settle. Failures are absorbed into the returned counts.
async fn dispatch_delta<S: KvStore + ?Sized>(
    worker: &Worker<S>,
    creator: &ResolvedCreator,
    delta: &RoomDelta,
) -> SideEffectCounts {
    let mut tasks: JoinSet<SideEffectCounts> = JoinSet::new();

    for room in delta.created.iter().cloned() {
        let worker = worker.clone();
        let creator = creator.clone();
        tasks.spawn(async move { handle_created(&worker, &creator, &room).await });
    }

    for room in delta.removed.iter().cloned() {
        let worker = worker.clone();
        tasks.spawn(async move { handle_removed(&worker, &room).await });
    }

    let mut total = SideEffectCounts::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(counts) => total.absorb(counts),
            Err(e) => tracing::error!(error = %e, "delta dispatch task aborted"),
        }
    }

    worker
        .metrics
        .record_notifications(total.notifications.delivered, total.notifications.failed);

    total
}

/// Side effects for one created room: notification fan-out and the
/// lifecycle "started" write run concurrently; neither blocks the other.
async fn handle_created<S: KvStore + ?Sized>(
    worker: &Worker<S>,
    creator: &ResolvedCreator,
    room: &Room,
) -> SideEffectCounts {
    let notification = Notification {
        username: creator.username.clone(),
        room_id: room.id.clone(),
        room_url: worker.config.room_url(&room.id),
    };

    let (notifications, lifecycle_ok) = tokio::join!(
        notify_endpoints(worker, creator, &notification),
        record_started(worker, creator, &room.id),
    );

    SideEffectCounts {
        notifications,
        lifecycle_recorded: usize::from(lifecycle_ok),
        lifecycle_failed: usize::from(!lifecycle_ok),
    }
}

/// Side effect for one removed room: the lifecycle "ended" write. No
/// notification fan-out on removal.
async fn handle_removed<S: KvStore + ?Sized>(worker: &Worker<S>, room: &Room) -> SideEffectCounts {
    let ok = match worker.lifecycle.record_ended(&room.id, Utc::now()).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(room = room.id.as_str(), error = %e, "lifecycle end write failed");
            false
        }
    };
    worker.metrics.record_lifecycle_write("ended", ok);

    SideEffectCounts {
        notifications: DispatchOutcome::default(),
        lifecycle_recorded: usize::from(ok),
        lifecycle_failed: usize::from(!ok),
    }
}

async fn record_started<S: KvStore + ?Sized>(
    worker: &Worker<S>,
    creator: &ResolvedCreator,
    room_id: &str,
) -> bool {
    let ok = match worker
        .lifecycle
        .record_started(room_id, &creator.username, &creator.user_id, Utc::now())
        .await
    {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(room = room_id, error = %e, "lifecycle start write failed");
            false
        }
    };
    worker.metrics.record_lifecycle_write("started", ok);
    ok
}

/// Fans out one delivery task per subscribed endpoint and aggregates the
/// outcomes. A directory failure yields zero attempts.
async fn notify_endpoints<S: KvStore + ?Sized>(
    worker: &Worker<S>,
    creator: &ResolvedCreator,
    notification: &Notification,
) -> DispatchOutcome {
    let endpoints = match worker.directory.endpoints_for(&creator.username).await {
        Ok(endpoints) => endpoints,
        Err(e) => {
            tracing::error!(
                username = creator.username.as_str(),
                error = %e,
                "endpoint query failed"
            );
            return DispatchOutcome::default();
        }
    };

    if endpoints.is_empty() {
        // No subscribers is a normal outcome.
        return DispatchOutcome::default();
    }

    let mut tasks: JoinSet<bool> = JoinSet::new();
    for endpoint in endpoints {
        let notifier = Arc::clone(&worker.notifier);
        let notification = notification.clone();
        tasks.spawn(async move {
            match notifier.deliver(&endpoint, &notification).await {
                Ok(()) => {
                    tracing::info!(endpoint = endpoint.id.as_str(), "notification delivered");
                    true
                }
                Err(e) => {
                    tracing::warn!(endpoint = endpoint.id.as_str(), error = %e, "delivery failed");
                    false
                }
            }
        });
    }

    let mut outcome = DispatchOutcome::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(true) => outcome.delivered += 1,
            Ok(false) | Err(_) => outcome.failed += 1,
        }
    }
    outcome
}
