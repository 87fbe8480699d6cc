//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus exporter and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(error = %e, "failed to install Prometheus recorder");
        return;
    }
    tracing::info!("metrics endpoint listening on http://{}", addr);
}

/// Record a completed proxy request.
pub fn record_request(service: &str, status: u16, duration: Duration) {
    let labels = [
        ("service", service.to_string()),
        ("status", status.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);
    histogram!("proxy_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record one forwarding retry.
pub fn record_retry(service: &str) {
    counter!("proxy_retries_total", "service" => service.to_string()).increment(1);
}

/// Record a denied authentication.
pub fn record_auth_denied(service: &str) {
    counter!("proxy_auth_denied_total", "service" => service.to_string()).increment(1);
}

/// Record a failed usage report post.
pub fn record_report_failure() {
    counter!("proxy_report_failures_total").increment(1);
}
