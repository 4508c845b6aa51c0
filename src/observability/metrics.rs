//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sws_admissions_total` (counter): admission outcomes (accepted, banned, overload)
//! - `sws_requests_total` (counter): responses by status
//! - `sws_service_time_seconds` (histogram): dispatch wall-clock time
//! - `sws_active_leases` (gauge): requests holding a worker slot
//! - `sws_pending_connections` (gauge): admitted connections awaiting a slot
//! - `sws_route_changes_total` (counter): registry changes by kind
//! - `sws_bridge_messages_total` (counter): broker traffic by direction
//!
//! Updates are no-ops until a recorder is installed by [`init_metrics`].

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_admission(outcome: &'static str) {
    metrics::counter!("sws_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_request(status: u16, service_time: Duration) {
    metrics::counter!("sws_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("sws_service_time_seconds").record(service_time.as_secs_f64());
}

pub fn record_active_leases(active: usize) {
    metrics::gauge!("sws_active_leases").set(active as f64);
}

pub fn record_pending(pending: usize) {
    metrics::gauge!("sws_pending_connections").set(pending as f64);
}

pub fn record_route_change(change: &'static str) {
    metrics::counter!("sws_route_changes_total", "change" => change).increment(1);
}

pub fn record_bridge_message(direction: &'static str) {
    metrics::counter!("sws_bridge_messages_total", "direction" => direction).increment(1);
}
