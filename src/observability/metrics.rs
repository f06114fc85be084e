//! Metrics recording.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by entry point and status code
//! - `edge_request_duration_seconds` (histogram): latency by entry point
//! - `edge_open_connections` (gauge): accepted connections not yet closed
//! - `edge_config_reloads_total` (counter): aggregator outcomes
//!
//! # Design Decisions
//! - Only the `metrics` facade is used; no exporter is installed here, so every
//!   call is a no-op until the embedding application sets a recorder

use std::time::Instant;

pub fn record_request(entry_point: &str, status: u16, start: Instant) {
    metrics::counter!(
        "edge_requests_total",
        "entry_point" => entry_point.to_string(),
        "code" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("edge_request_duration_seconds", "entry_point" => entry_point.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_open_connections(entry_point: &str, open: usize) {
    metrics::gauge!("edge_open_connections", "entry_point" => entry_point.to_string()).set(open as f64);
}

/// `outcome` is one of `published`, `unchanged`, `rejected`.
pub fn record_config_reload(outcome: &'static str) {
    metrics::counter!("edge_config_reloads_total", "outcome" => outcome).increment(1);
}
