//! Roomwatch polling runner.
//!
//! Wires the reconciliation engine to its collaborators from environment
//! configuration and runs one cycle per interval tick. A cycle that is
//! skipped (lock contention) or fails is logged; the loop always continues.
//!
//! ## Environment
//!
//! - `ROOMWATCH_TARGETS` — comma-separated creator usernames
//! - `ROOMWATCH_TARGETS_BY_ID` — comma-separated platform user ids
//! - `ROOMWATCH_INTERVAL_SECS` — polling interval (default 300)
//! - `ROOMWATCH_PLATFORM_TOKEN` — bearer token for the platform API
//! - `ROOMWATCH_PLATFORM_BASE_URL` — API base URL (default the platform's)
//! - `ROOMWATCH_KEY_PREFIX` / `ROOMWATCH_KEY_SUFFIX` — store key affixes
//! - `ROOMWATCH_LOG_FORMAT` — `json` or `pretty` (default pretty)

use std::sync::Arc;
use std::time::Duration;

use roomwatch_core::observability::{init_logging, LogFormat};
use roomwatch_core::MemoryKv;

use roomwatch_engine::config::{EngineConfig, KeyNamespace};
use roomwatch_engine::endpoint::MemoryDirectory;
use roomwatch_engine::engine::ReconcileEngine;
use roomwatch_engine::error::{Error, Result};
use roomwatch_engine::lifecycle::KvLifecycleStore;
use roomwatch_engine::notify::HttpNotifier;
use roomwatch_engine::platform::{HttpRoomSource, DEFAULT_BASE_URL};
use roomwatch_engine::room::CreatorRef;

const DEFAULT_INTERVAL_SECS: u64 = 300;

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Splits a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn load_targets() -> Result<Vec<CreatorRef>> {
    let usernames = split_list(&env_or_default("ROOMWATCH_TARGETS", ""));
    let user_ids = split_list(&env_or_default("ROOMWATCH_TARGETS_BY_ID", ""));

    let mut targets: Vec<CreatorRef> = usernames
        .into_iter()
        .map(CreatorRef::Username)
        .collect();
    targets.extend(user_ids.into_iter().map(CreatorRef::UserId));

    if targets.is_empty() {
        return Err(Error::Configuration(
            "no targets configured: set ROOMWATCH_TARGETS and/or ROOMWATCH_TARGETS_BY_ID"
                .to_string(),
        ));
    }
    Ok(targets)
}

#[tokio::main]
async fn main() -> Result<()> {
    let format = match env_or_default("ROOMWATCH_LOG_FORMAT", "pretty").as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Pretty,
    };
    init_logging(format);

    let targets = load_targets()?;

    let interval_secs = env_or_default("ROOMWATCH_INTERVAL_SECS", "")
        .parse::<u64>()
        .unwrap_or(DEFAULT_INTERVAL_SECS);

    let token = std::env::var("ROOMWATCH_PLATFORM_TOKEN")
        .map_err(|_| Error::Configuration("ROOMWATCH_PLATFORM_TOKEN is not set".to_string()))?;
    let base_url = env_or_default("ROOMWATCH_PLATFORM_BASE_URL", DEFAULT_BASE_URL);

    let namespace = KeyNamespace::new(
        &env_or_default("ROOMWATCH_KEY_PREFIX", ""),
        &env_or_default("ROOMWATCH_KEY_SUFFIX", ""),
    );
    let config = EngineConfig::default().with_namespace(namespace.clone());

    let store = Arc::new(MemoryKv::new());
    let source = Arc::new(HttpRoomSource::new(base_url, token)?);
    let directory = Arc::new(MemoryDirectory::new());
    let notifier = Arc::new(HttpNotifier::new()?);
    let lifecycle = Arc::new(KvLifecycleStore::new(Arc::clone(&store), namespace));

    let engine = ReconcileEngine::new(store, source, directory, notifier, lifecycle, config);

    tracing::info!(
        targets = targets.len(),
        interval_secs,
        "starting roomwatch polling loop"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;

        match engine.run_cycle(&targets).await {
            Ok(report) if report.was_skipped() => {
                tracing::info!("cycle skipped: another cycle is running");
            }
            Ok(report) => {
                tracing::info!(
                    processed = report.processed_count(),
                    failed = report.failed_count(),
                    "cycle completed"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "cycle failed");
            }
        }
    }
}
