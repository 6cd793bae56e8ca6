//! Prometheus metrics for monitoring the completion proxy.
//!
//! Metrics live in the default Prometheus registry and are exposed on
//! `/metrics`.

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    GaugeVec, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;

/// Container for all application metrics.
pub struct Metrics {
    /// Total number of requests by method, endpoint and status
    pub request_count: IntCounterVec,

    /// Request duration histogram in seconds (time to first byte for streams)
    pub request_duration: HistogramVec,

    /// Number of currently active requests by endpoint
    pub active_requests: GaugeVec,

    /// Backend failures by kind (`status`, `network`, `timeout`)
    pub backend_errors: IntCounterVec,

    /// Bytes relayed from the backend to clients
    pub relayed_bytes: IntCounter,

    /// Streams abandoned by the client before the backend finished
    pub client_disconnects: IntCounter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialize the metrics registry.
///
/// Safe to call more than once; every call returns the same instance.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let request_count = register_int_counter_vec!(
            "copilot_proxy_requests_total",
            "Total number of requests",
            &["method", "endpoint", "status_code"]
        )
        .expect("Failed to register request_count metric");

        let request_duration = register_histogram_vec!(
            "copilot_proxy_request_duration_seconds",
            "Request duration in seconds",
            &["method", "endpoint"],
            vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]
        )
        .expect("Failed to register request_duration metric");

        let active_requests = register_gauge_vec!(
            "copilot_proxy_active_requests",
            "Number of active requests",
            &["endpoint"]
        )
        .expect("Failed to register active_requests metric");

        let backend_errors = register_int_counter_vec!(
            "copilot_proxy_backend_errors_total",
            "Backend failures by kind",
            &["kind"]
        )
        .expect("Failed to register backend_errors metric");

        let relayed_bytes = register_int_counter!(
            "copilot_proxy_relayed_bytes_total",
            "Bytes relayed from the backend to clients"
        )
        .expect("Failed to register relayed_bytes metric");

        let client_disconnects = register_int_counter!(
            "copilot_proxy_client_disconnects_total",
            "Streams abandoned by the client before the backend finished"
        )
        .expect("Failed to register client_disconnects metric");

        Metrics {
            request_count,
            request_duration,
            active_requests,
            backend_errors,
            relayed_bytes,
            client_disconnects,
        }
    })
}

/// Get the global metrics instance, initializing it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}
