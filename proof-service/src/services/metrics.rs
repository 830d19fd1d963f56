//! Prometheus metrics for proof-service.
//!
//! Domain counters live in the `prometheus` default registry. HTTP request
//! metrics emitted through the `metrics` facade by the shared middleware are
//! captured by a Prometheus recorder and appended to the same export.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

/// Handle to the recorder behind the `metrics` facade.
static HTTP_METRICS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Proof analyses by outcome (`ok`, `mismatch`, `no_match`, `failed`).
pub static PROOF_ANALYSES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "proof_analyses_total",
        "Total number of payment proof analyses",
        &["status"]
    )
    .expect("Failed to register PROOF_ANALYSES")
});

pub static PROOF_CONFIRMATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "proof_confirmations_total",
        "Total number of payment proof confirmations",
        &["status"]
    )
    .expect("Failed to register PROOF_CONFIRMATIONS")
});

/// Statement wizard candidates by match status.
pub static PROOF_MATCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "proof_matches_total",
        "Total number of statement lines matched against subscriptions",
        &["status"]
    )
    .expect("Failed to register PROOF_MATCHES")
});

pub static BACKEND_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "backend_request_duration_seconds",
        "Hosted backend request duration in seconds",
        &["operation"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register BACKEND_REQUEST_DURATION")
});

pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "proof_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics and install the HTTP metrics recorder.
///
/// Call once at startup, before the first request is served. Later calls are
/// no-ops.
pub fn init_metrics() {
    Lazy::force(&PROOF_ANALYSES);
    Lazy::force(&PROOF_CONFIRMATIONS);
    Lazy::force(&PROOF_MATCHES);
    Lazy::force(&BACKEND_REQUEST_DURATION);
    Lazy::force(&ERRORS);

    if HTTP_METRICS.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HTTP_METRICS.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Failed to install HTTP metrics recorder"),
    }
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    let mut output = String::from_utf8(buffer).unwrap_or_default();

    if let Some(handle) = HTTP_METRICS.get() {
        output.push_str(&handle.render());
    }
    output
}

pub fn record_analysis(status: &str) {
    PROOF_ANALYSES.with_label_values(&[status]).inc();
}

pub fn record_confirmation(status: &str) {
    PROOF_CONFIRMATIONS.with_label_values(&[status]).inc();
}

pub fn record_match(status: &str) {
    PROOF_MATCHES.with_label_values(&[status]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
