//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `accesserator_reconciliations_total` - Total number of reconcile passes
//! - `accesserator_reconciliation_errors_total` - Total number of failed reconcile passes
//! - `accesserator_reconciliation_duration_seconds` - Duration of reconcile passes
//! - `accesserator_requeues_total` - Requeues by reason
//! - `accesserator_resources_converged_total` - Owned resources converged, by kind and result
//! - `accesserator_status_updates_total` - SecurityConfig status writes, by result
//! - `accesserator_admission_requests_total` - Pod admission requests, by operation and outcome
//! - `accesserator_admission_duration_seconds` - Duration of admission decisions

use anyhow::Result;
use prometheus::core::Collector;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "accesserator_reconciliations_total",
        "Total number of reconcile passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "accesserator_reconciliation_errors_total",
        "Total number of failed reconcile passes",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "accesserator_reconciliation_duration_seconds",
            "Duration of reconcile passes in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("accesserator_requeues_total", "Total number of requeues by reason"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static RESOURCES_CONVERGED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "accesserator_resources_converged_total",
            "Total number of owned resources converged by kind and result",
        ),
        &["kind", "result"],
    )
    .expect("Failed to create RESOURCES_CONVERGED_TOTAL metric - this should never happen")
});

static STATUS_UPDATES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "accesserator_status_updates_total",
            "Total number of SecurityConfig status writes by result",
        ),
        &["result"],
    )
    .expect("Failed to create STATUS_UPDATES_TOTAL metric - this should never happen")
});

static ADMISSION_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "accesserator_admission_requests_total",
            "Total number of Pod admission requests by operation and outcome",
        ),
        &["operation", "allowed"],
    )
    .expect("Failed to create ADMISSION_REQUESTS_TOTAL metric - this should never happen")
});

static ADMISSION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "accesserator_admission_duration_seconds",
            "Duration of Pod admission decisions in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["operation"],
    )
    .expect("Failed to create ADMISSION_DURATION metric - this should never happen")
});

fn register<C: Collector + Clone + 'static>(collector: &C) -> Result<()> {
    match REGISTRY.register(Box::new(collector.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Register every metric with the operator registry; safe to call repeatedly
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    register(&*RECONCILIATIONS_TOTAL)?;
    register(&*RECONCILIATION_ERRORS_TOTAL)?;
    register(&*RECONCILIATION_DURATION)?;
    register(&*REQUEUES_TOTAL)?;
    register(&*RESOURCES_CONVERGED_TOTAL)?;
    register(&*STATUS_UPDATES_TOTAL)?;
    register(&*ADMISSION_REQUESTS_TOTAL)?;
    register(&*ADMISSION_DURATION)?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_resource_converged(kind: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    RESOURCES_CONVERGED_TOTAL
        .with_label_values(&[kind, result])
        .inc();
}

pub fn record_status_update(result: &str) {
    STATUS_UPDATES_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_admission(operation: &str, allowed: bool, duration: f64) {
    let allowed = if allowed { "true" } else { "false" };
    ADMISSION_REQUESTS_TOTAL
        .with_label_values(&[operation, allowed])
        .inc();
    ADMISSION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        assert_eq!(RECONCILIATIONS_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_increment_reconciliation_errors() {
        let before = RECONCILIATION_ERRORS_TOTAL.get();
        increment_reconciliation_errors();
        assert_eq!(RECONCILIATION_ERRORS_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_requeues_by_reason() {
        let before = REQUEUES_TOTAL.with_label_values(&["pending"]).get();
        increment_requeues_total("pending");
        assert_eq!(
            REQUEUES_TOTAL.with_label_values(&["pending"]).get(),
            before + 1u64
        );
    }

    #[test]
    fn test_record_resource_converged() {
        let before = RESOURCES_CONVERGED_TOTAL
            .with_label_values(&["Jwker", "error"])
            .get();
        record_resource_converged("Jwker", false);
        assert_eq!(
            RESOURCES_CONVERGED_TOTAL
                .with_label_values(&["Jwker", "error"])
                .get(),
            before + 1u64
        );
    }

    #[test]
    fn test_record_admission() {
        let before = ADMISSION_REQUESTS_TOTAL
            .with_label_values(&["validate", "false"])
            .get();
        record_admission("validate", false, 0.01);
        assert_eq!(
            ADMISSION_REQUESTS_TOTAL
                .with_label_values(&["validate", "false"])
                .get(),
            before + 1u64
        );
    }
}
