//! # roomwatch-core
//!
//! Shared infrastructure for the Roomwatch reconciliation service:
//!
//! - **Errors**: structured error types used across components
//! - **Key-value capability**: the [`kv::KvStore`] trait with conditional
//!   writes, plus an in-memory backend for tests
//! - **Cycle lock**: single-flag mutual exclusion preventing overlapping
//!   reconciliation cycles
//! - **Observability**: logging initialization and span constructors

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod kv;
pub mod lock;
pub mod observability;

pub use error::{Error, Result};
pub use kv::{EntryMeta, KvStore, MemoryKv, WritePrecondition, WriteResult};
pub use lock::{CycleGuard, CycleLock, LockRecord, DEFAULT_LOCK_TTL};
