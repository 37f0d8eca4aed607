//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vhostd_requests_total` (counter): requests by status
//! - `vhostd_request_duration_seconds` (histogram): latency distribution
//! - `vhostd_sleeps_total` (counter): script sleeps by outcome
//! - `vhostd_wakes_total` (counter): executions resumed by the scheduler tick
//! - `vhostd_stale_wakes_total` (counter): wakes whose execution was already gone
//! - `vhostd_pending_sleeps` (gauge): timed sleeps in the bucket table
//! - `vhostd_route_reloads_total` (counter): reloads by result
//! - `vhostd_route_rejections_total` (counter): route entries refused on reload

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::vhost::ReloadReport;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(status: u16, start: Instant) {
    ::metrics::counter!("vhostd_requests_total", "status" => status.to_string()).increment(1);
    ::metrics::histogram!("vhostd_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_sleep(outcome: &'static str) {
    ::metrics::counter!("vhostd_sleeps_total", "outcome" => outcome).increment(1);
}

pub fn record_resumed(count: usize) {
    ::metrics::counter!("vhostd_wakes_total").increment(count as u64);
}

pub fn record_stale_wake() {
    ::metrics::counter!("vhostd_stale_wakes_total").increment(1);
}

pub fn set_pending_sleeps(pending: usize) {
    ::metrics::gauge!("vhostd_pending_sleeps").set(pending as f64);
}

pub fn record_route_reload(report: &ReloadReport) {
    ::metrics::counter!("vhostd_route_reloads_total", "result" => "ok").increment(1);
    if !report.rejected.is_empty() {
        ::metrics::counter!("vhostd_route_rejections_total").increment(report.rejected.len() as u64);
    }
}

pub fn record_route_reload_failure() {
    ::metrics::counter!("vhostd_route_reloads_total", "result" => "error").increment(1);
}
