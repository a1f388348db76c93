//! Observability metrics for the reconciliation engine.
//!
//! Exposed via the `metrics` crate facade; install a Prometheus (or other)
//! recorder in the binary to export them.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `roomwatch_cycles_total` | Counter | `status` | Cycle outcomes (completed/skipped/failed) |
//! | `roomwatch_notifications_total` | Counter | `result` | Notification deliveries (delivered/failed) |
//! | `roomwatch_lifecycle_writes_total` | Counter | `event`, `result` | Lifecycle record writes |
//! | `roomwatch_creators_last_cycle` | Gauge | - | Creators processed in the most recent cycle |

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Cycle outcomes.
    pub const CYCLES_TOTAL: &str = "roomwatch_cycles_total";
    /// Counter: Notification delivery outcomes.
    pub const NOTIFICATIONS_TOTAL: &str = "roomwatch_notifications_total";
    /// Counter: Lifecycle record writes.
    pub const LIFECYCLE_WRITES_TOTAL: &str = "roomwatch_lifecycle_writes_total";
    /// Gauge: Creators processed in the most recent cycle.
    pub const CREATORS_LAST_CYCLE: &str = "roomwatch_creators_last_cycle";
}

/// Label keys used across metrics.
pub mod labels {
    /// Cycle or delivery outcome status.
    pub const STATUS: &str = "status";
    /// Delivery result (delivered, failed).
    pub const RESULT: &str = "result";
    /// Lifecycle event kind (started, ended).
    pub const EVENT: &str = "event";
}

/// Metrics recorder for the reconciliation engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineMetrics;

impl EngineMetrics {
    /// Creates a metrics handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records a cycle outcome (`completed`, `skipped`, or `failed`).
    pub fn record_cycle(&self, status: &'static str) {
        counter!(names::CYCLES_TOTAL, labels::STATUS => status).increment(1);
    }

    /// Records notification delivery outcomes for one cycle.
    pub fn record_notifications(&self, delivered: usize, failed: usize) {
        if delivered > 0 {
            counter!(names::NOTIFICATIONS_TOTAL, labels::RESULT => "delivered")
                .increment(u64::try_from(delivered).unwrap_or(u64::MAX));
        }
        if failed > 0 {
            counter!(names::NOTIFICATIONS_TOTAL, labels::RESULT => "failed")
                .increment(u64::try_from(failed).unwrap_or(u64::MAX));
        }
    }

    /// Records a lifecycle write outcome.
    pub fn record_lifecycle_write(&self, event: &'static str, succeeded: bool) {
        let result = if succeeded { "success" } else { "failed" };
        counter!(
            names::LIFECYCLE_WRITES_TOTAL,
            labels::EVENT => event,
            labels::RESULT => result
        )
        .increment(1);
    }

    /// Sets the number of creators processed in the most recent cycle.
    pub fn set_creators_last_cycle(&self, count: usize) {
        #[allow(clippy::cast_precision_loss)]
        gauge!(names::CREATORS_LAST_CYCLE).set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_prefixed() {
        assert!(names::CYCLES_TOTAL.starts_with("roomwatch_"));
        assert!(names::NOTIFICATIONS_TOTAL.starts_with("roomwatch_"));
        assert!(names::LIFECYCLE_WRITES_TOTAL.starts_with("roomwatch_"));
        assert!(names::CREATORS_LAST_CYCLE.starts_with("roomwatch_"));
    }

    #[test]
    fn recording_without_a_recorder_is_a_noop() {
        // The metrics facade drops records when no recorder is installed.
        let metrics = EngineMetrics::new();
        metrics.record_cycle("completed");
        metrics.record_notifications(2, 1);
        metrics.record_lifecycle_write("started", true);
        metrics.set_creators_last_cycle(3);
    }
}
