//! # roomwatch-engine
//!
//! State-reconciliation and notification-dispatch engine for live audio
//! rooms. Given the previous snapshot of known rooms per creator and a
//! freshly fetched one, the engine computes the created/removed delta,
//! dispatches notifications and lifecycle writes for each delta entry with
//! independent failure isolation, and durably commits the new snapshot —
//! at most one cycle at a time.
//!
//! ## Core concepts
//!
//! - **Snapshot**: last-known room list for one creator, persisted between
//!   polling cycles; absence is an empty list
//! - **Delta**: created/removed room sets between two snapshots, by room id
//! - **Endpoint**: an externally registered notification target bound to one
//!   or more creators
//!
//! External collaborators (the platform API, the endpoint directory, the
//! webhook transport, the stores) are capability traits with in-memory
//! implementations, so the engine is testable without any network.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use roomwatch_core::MemoryKv;
//! use roomwatch_engine::config::EngineConfig;
//! use roomwatch_engine::endpoint::MemoryDirectory;
//! use roomwatch_engine::engine::ReconcileEngine;
//! use roomwatch_engine::error::Result;
//! use roomwatch_engine::lifecycle::MemoryLifecycle;
//! use roomwatch_engine::notify::MemoryNotifier;
//! use roomwatch_engine::room::CreatorRef;
//! use roomwatch_engine::source::MemoryRoomSource;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let source = Arc::new(MemoryRoomSource::new());
//! source.add_creator("alice", "42");
//!
//! let engine = ReconcileEngine::new(
//!     Arc::new(MemoryKv::new()),
//!     source,
//!     Arc::new(MemoryDirectory::new()),
//!     Arc::new(MemoryNotifier::new()),
//!     Arc::new(MemoryLifecycle::new()),
//!     EngineConfig::default(),
//! );
//!
//! let report = engine
//!     .run_cycle(&[CreatorRef::Username("alice".into())])
//!     .await?;
//! assert_eq!(report.processed_count(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod diff;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod platform;
pub mod room;
pub mod snapshot;
pub mod source;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{EngineConfig, KeyNamespace};
    pub use crate::diff::diff_rooms;
    pub use crate::endpoint::{Destination, Endpoint, EndpointDirectory, HttpMethod, MemoryDirectory};
    pub use crate::engine::{CreatorOutcome, CreatorStatus, CycleOutcome, CycleReport, ReconcileEngine};
    pub use crate::error::{Error, Result};
    pub use crate::lifecycle::{KvLifecycleStore, LifecycleStore, MemoryLifecycle};
    pub use crate::notify::{DispatchOutcome, HttpNotifier, MemoryNotifier, Notification, Notifier};
    pub use crate::platform::HttpRoomSource;
    pub use crate::room::{CreatorRef, ResolvedCreator, Room, RoomDelta, RoomList};
    pub use crate::snapshot::SnapshotStore;
    pub use crate::source::{MemoryRoomSource, RoomSource};
}
