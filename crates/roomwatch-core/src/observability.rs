//! Observability infrastructure for Roomwatch.
//!
//! Structured logging with consistent spans: one span per reconciliation
//! cycle, one nested span per creator.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `roomwatch_engine=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span covering one reconciliation cycle.
#[must_use]
pub fn cycle_span(holder_id: &str) -> Span {
    tracing::info_span!("cycle", holder = holder_id)
}

/// Creates a span covering one creator's processing within a cycle.
#[must_use]
pub fn creator_span(username: &str) -> Span {
    tracing::info_span!("creator", username = username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty); // Second call should be no-op
    }

    #[test]
    fn span_helpers_create_spans() {
        let span = cycle_span("01HOLDER");
        let _guard = span.enter();
        let inner = creator_span("alice");
        let _inner_guard = inner.enter();
        tracing::info!("test message in span");
    }
}
