//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize metrics exporter and server. Opt-in: without it, all
/// recording helpers are no-ops.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Helper to record a dispatched request.
pub fn record_dispatch(backend: &str, status: u16, started: Instant) {
    let labels = [
        ("backend", backend.to_string()),
        ("status", status.to_string()),
    ];

    counter!("dispatch_requests_total", &labels).increment(1);
    histogram!("dispatch_request_duration_seconds", &labels).record(started.elapsed().as_secs_f64());
}

/// Helper to record an upstream transport failure.
pub fn record_dispatch_error(backend: &str) {
    counter!("dispatch_upstream_errors_total", "backend" => backend.to_string()).increment(1);
}

/// Helper to record a rejected admission.
pub fn record_rate_limited(reason: &'static str) {
    counter!("dispatch_rate_limited_total", "reason" => reason).increment(1);
}

/// Helper to publish a backend's passive health penalty.
pub fn record_backend_health(backend: &str, fail_score: i64) {
    gauge!("dispatch_backend_fail_score", "backend" => backend.to_string()).set(fail_score as f64);
}
