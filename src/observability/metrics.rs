//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): completed requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency by method
//! - `gateway_service_health` (gauge): 1=healthy, 0=otherwise, per service
//! - `gateway_health_probe_duration_seconds` (histogram): probe latency per service
//! - `gateway_tokens_issued_total` (counter)
//!
//! Recording is a no-op until `init_metrics` installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed request. `status` is `"error"` or `"cancelled"` when
/// no response was produced.
pub fn record_request(method: &str, status: &str, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_service_health(service: &str, healthy: bool, response_time_ms: u64) {
    gauge!("gateway_service_health", "service" => service.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
    histogram!("gateway_health_probe_duration_seconds", "service" => service.to_string())
        .record(response_time_ms as f64 / 1000.0);
}

pub fn record_token_issued() {
    counter!("gateway_tokens_issued_total").increment(1);
}
