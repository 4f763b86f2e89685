//! Prometheus metrics for the execution pipeline
//!
//! # Example Queries
//!
//! ```promql
//! # Share of automatic triggers skipped because nothing changed
//! sum(rate(vigil_trigger_outcomes_total{outcome="skipped_not_altered"}[1h]))
//! / sum(rate(vigil_trigger_outcomes_total[1h]))
//!
//! # P99 staleness probe latency
//! histogram_quantile(0.99, rate(vigil_staleness_probe_duration_seconds_bucket[5m]))
//! ```

use prometheus::{register_counter_vec, register_histogram, CounterVec, Histogram};
use std::sync::LazyLock;

/// Trigger invocations by suite kind and outcome.
///
/// Labels:
/// - `kind`: quantitative | qualitative | qualitative_schema | custom
/// - `outcome`: executed | skipped_deactivated | skipped_not_altered | failed
pub static TRIGGER_OUTCOMES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        "vigil_trigger_outcomes_total",
        "Trigger invocations by suite kind and outcome",
        &["kind", "outcome"]
    )
    .expect("Failed to register vigil_trigger_outcomes_total metric")
});

/// Handled execution results by outcome.
///
/// Labels:
/// - `outcome`: sent | suppressed | no_anomaly | failed
pub static ALERT_OUTCOMES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        "vigil_alert_outcomes_total",
        "Handled execution results by outcome",
        &["outcome"]
    )
    .expect("Failed to register vigil_alert_outcomes_total metric")
});

/// Duration of warehouse staleness probes in seconds.
pub static STALENESS_PROBE_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "vigil_staleness_probe_duration_seconds",
        "Duration of warehouse staleness probes",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register vigil_staleness_probe_duration_seconds metric")
});

/// Processed feedback by outcome.
///
/// Labels:
/// - `outcome`: recorded | threshold_adjusted | threshold_failed | failed
pub static FEEDBACK_OUTCOMES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        "vigil_feedback_outcomes_total",
        "Processed user feedback by outcome",
        &["outcome"]
    )
    .expect("Failed to register vigil_feedback_outcomes_total metric")
});

/// Suite lifecycle operations.
///
/// Labels:
/// - `operation`: create | update | delete
/// - `status`: success | failure
pub static SUITE_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        "vigil_suite_operations_total",
        "Suite lifecycle operations by status",
        &["operation", "status"]
    )
    .expect("Failed to register vigil_suite_operations_total metric")
});

pub fn record_trigger(kind: &str, outcome: &str) {
    TRIGGER_OUTCOMES_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

pub fn record_alert(outcome: &str) {
    ALERT_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_feedback(outcome: &str) {
    FEEDBACK_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_suite_operation(operation: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    SUITE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}
