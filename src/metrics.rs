// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the CoreDNS operator.
//!
//! All metrics carry the prefix `coredns_operator_` and are exposed on the
//! admin server's `/metrics` endpoint.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Passes by lifecycle event and outcome
//! - **Resource Lifecycle Metrics** - Applies and deletes by kind
//! - **Collision Metrics** - Desired identities occupied by foreign objects
//! - **Error Metrics** - Failures by error category
//! - **Leader Election Metrics** - Primary status of this instance
//!
//! # Example
//!
//! ```rust,no_run
//! use coredns_operator::metrics::record_reconciliation;
//!
//! record_reconciliation("config-changed", "active", std::time::Duration::from_millis(250));
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all operator metrics
const METRICS_NAMESPACE: &str = "coredns_operator";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliation passes by lifecycle event and outcome
///
/// Labels:
/// - `event`: Lifecycle event that triggered the pass (`install`, `update-status`, ...)
/// - `outcome`: Resulting status category (`active`, `waiting`, `blocked`, `maintenance`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliation passes by event and outcome",
    );
    let counter = CounterVec::new(opts, &["event", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation passes in seconds
///
/// Labels:
/// - `event`: Lifecycle event that triggered the pass
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliation passes in seconds by event",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["event"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Resource Lifecycle Metrics
// ============================================================================

/// Total number of resources applied
///
/// Labels:
/// - `kind`: Kind of resource applied
pub static RESOURCES_APPLIED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_applied_total"),
        "Total number of resources applied by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of resources deleted by purge or scrub
///
/// Labels:
/// - `kind`: Kind of resource deleted
pub static RESOURCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_deleted_total"),
        "Total number of resources deleted by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Collision Metrics
// ============================================================================

/// Number of conflicting identities found by the most recent analysis
pub static RESOURCE_COLLISIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        format!("{METRICS_NAMESPACE}_resource_collisions"),
        "Number of desired identities occupied by unrecognized objects",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by category
///
/// Labels:
/// - `error_type`: Category of error (`config_incomplete`, `collision`, `client_transient`, ...)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by category",
    );
    let counter = CounterVec::new(opts, &["error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Leader Election Metrics
// ============================================================================

/// Current leader election status
///
/// Value: 1 if this instance is primary, 0 otherwise
pub static LEADER_STATUS: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_leader_status"),
        "Current leader election status (1 = primary, 0 = follower)",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a finished reconciliation pass
///
/// # Arguments
/// * `event` - Lifecycle event that triggered the pass
/// * `outcome` - Status category the pass ended with
/// * `duration` - Duration of the pass
pub fn record_reconciliation(event: &str, outcome: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[event, outcome])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[event])
        .observe(duration.as_secs_f64());
}

/// Record a resource apply
pub fn record_resource_applied(kind: &str) {
    RESOURCES_APPLIED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a resource deletion
pub fn record_resource_deleted(kind: &str) {
    RESOURCES_DELETED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record the collision count of the latest analysis
pub fn record_collisions(count: usize) {
    RESOURCE_COLLISIONS.set(i64::try_from(count).unwrap_or(i64::MAX));
}

/// Record an error
///
/// # Arguments
/// * `error_type` - Category of error (e.g., `client_transient`, `authorization`)
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Record the primary status of this instance
pub fn record_leader_status(is_primary: bool) {
    LEADER_STATUS.set(if is_primary { 1.0 } else { 0.0 });
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_reconciliation() {
        let event = "metrics-test";
        let duration = Duration::from_millis(500);

        record_reconciliation(event, "active", duration);

        let counter = RECONCILIATION_TOTAL.with_label_values(&[event, "active"]);
        assert!(counter.get() > 0.0);

        let histogram = RECONCILIATION_DURATION_SECONDS.with_label_values(&[event]);
        assert!(histogram.get_sample_count() > 0);
    }

    #[test]
    fn test_record_collisions_exposes_gauge() {
        record_collisions(3);

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("coredns_operator_resource_collisions"));
    }

    #[test]
    fn test_gather_metrics() {
        record_reconciliation("gather-test", "waiting", Duration::from_millis(100));
        record_resource_applied("ConfigMap");

        let metrics_text = gather_metrics().expect("Gathering metrics should succeed");
        assert!(
            metrics_text.contains("coredns_operator_reconciliations_total"),
            "Metrics should contain reconciliation counter"
        );
        assert!(
            metrics_text.contains("coredns_operator_resources_applied_total"),
            "Metrics should contain apply counter"
        );
    }
}
