//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): finalized responses by method,
//!   status and route group
//! - `http_request_duration_seconds` (histogram): time from chain entry to
//!   finalized response
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   deployments without the exporter pay nothing
//! - Unmatched requests are labelled `none` to keep label cardinality
//!   bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("invalid metrics address '{0}'")]
    InvalidAddress(String),

    #[error("failed to install metrics exporter: {0}")]
    Install(String),
}

/// Start the Prometheus scrape listener on `address`.
pub fn init_metrics(address: &str) -> Result<(), MetricsError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| MetricsError::InvalidAddress(address.to_string()))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_counter!("http_requests_total", "Total number of finalized HTTP responses");
    describe_histogram!(
        "http_request_duration_seconds",
        "Time from chain entry to finalized response"
    );

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finalized response.
pub fn record_request(method: &str, status: u16, group: &str, start_time: Instant) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "group" => group.to_string()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "group" => group.to_string()
    )
    .record(start_time.elapsed().as_secs_f64());
}
