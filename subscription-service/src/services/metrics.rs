//! Metrics module for subscription-service.
//! Provides Prometheus metrics for subscription operations and dry runs.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Identity cache lookups by lookup type and outcome
pub static IDENTITY_CACHE_LOOKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "subscription_identity_cache_lookups_total",
            "Identity cache lookups by lookup type and outcome"
        ),
        &["lookup", "outcome"]
    )
    .expect("Failed to register IDENTITY_CACHE_LOOKUPS_TOTAL")
});

/// Committed subscription operations counter
pub static SUBSCRIPTION_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Dry-run simulations counter
pub static DRY_RUNS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// API request counter
pub static API_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// API request duration histogram
pub static API_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    SUBSCRIPTION_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_operations_total",
                "Total committed subscription operations by operation type"
            ),
            &["operation"]
        )
        .expect("Failed to register SUBSCRIPTION_OPERATIONS_TOTAL")
    });

    DRY_RUNS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("subscription_dry_runs_total", "Total dry-run simulations by action"),
            &["action"]
        )
        .expect("Failed to register DRY_RUNS_TOTAL")
    });

    API_REQUESTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("subscription_api_requests_total", "Total API requests"),
            &["method", "status"]
        )
        .expect("Failed to register API_REQUESTS_TOTAL")
    });

    // Most operations are in-memory decisions plus a couple of store calls
    API_REQUEST_DURATION.get_or_init(|| {
        register_histogram_vec!(
            histogram_opts!(
                "subscription_api_request_duration_seconds",
                "API request duration",
                vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
            ),
            &["method"]
        )
        .expect("Failed to register API_REQUEST_DURATION")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("subscription_errors_total", "Total errors by type for alerting"),
            &["error_type", "method"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*IDENTITY_CACHE_LOOKUPS_TOTAL;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a committed subscription operation.
pub fn record_subscription_operation(operation: &str) {
    if let Some(counter) = SUBSCRIPTION_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

/// Record a dry-run simulation.
pub fn record_dry_run(action: &str) {
    if let Some(counter) = DRY_RUNS_TOTAL.get() {
        counter.with_label_values(&[action]).inc();
    }
}

/// Record an API request.
pub fn record_api_request(method: &str, status: &str) {
    if let Some(counter) = API_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, status]).inc();
    }
}

/// Record API request duration.
pub fn record_api_request_duration(method: &str, duration_secs: f64) {
    if let Some(histogram) = API_REQUEST_DURATION.get() {
        histogram.with_label_values(&[method]).observe(duration_secs);
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, method: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, method]).inc();
    }
}

/// Record an identity cache lookup.
pub fn record_identity_lookup(lookup: &str, outcome: &str) {
    IDENTITY_CACHE_LOOKUPS_TOTAL
        .with_label_values(&[lookup, outcome])
        .inc();
}
