//! Metrics collection and exposition.
//!
//! # Metrics
//! - `correlator_queue_depth` (gauge): events waiting in the shipper queue
//! - `correlator_dropped_events_total` (counter): events discarded by backpressure or delivery failure
//! - `correlator_delivery_retries_total` (counter): retried batch deliveries
//! - `correlator_orphan_spans_closed_total` (counter): spans closed by the sweeper
//! - `correlator_events_delivered_total` (counter): events accepted by the sink
//! - `correlator_events_spilled_total` (counter): events written to the overflow spool
//! - `correlator_emit_failures_total` (counter): logging-internal failures, by reason
//! - `correlator_store_inserts_total` (counter): store inserts, by outcome
//!
//! # Design Decisions
//! - Signals are exposed for health/alerting only; nothing reads them back
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_queue_depth(depth: usize) {
    gauge!("correlator_queue_depth").set(depth as f64);
}

pub fn record_dropped(count: u64, reason: &'static str) {
    counter!("correlator_dropped_events_total", "reason" => reason).increment(count);
}

pub fn record_retry() {
    counter!("correlator_delivery_retries_total").increment(1);
}

pub fn record_delivered(count: u64) {
    counter!("correlator_events_delivered_total").increment(count);
}

pub fn record_spilled(count: u64) {
    counter!("correlator_events_spilled_total").increment(count);
}

pub fn record_orphan_closed(count: u64) {
    counter!("correlator_orphan_spans_closed_total").increment(count);
}

pub fn record_emit_failure(reason: &'static str) {
    counter!("correlator_emit_failures_total", "reason" => reason).increment(1);
}

pub fn record_store_insert(outcome: &'static str) {
    counter!("correlator_store_inserts_total", "outcome" => outcome).increment(1);
}
