//! Metrics collection and exposition.
//!
//! # Metrics
//! - `loader_rows_fetched_total` (counter): normalized rows by dataset kind
//! - `loader_records_dropped_total` (counter): dropped records by kind, reason
//! - `loader_duplicates_total` (counter): rows discarded by dedup
//! - `loader_cycles_total` (counter): cycles by kind, outcome
//! - `loader_cycle_duration_seconds` (histogram)
//! - `loader_dataset_rows` (gauge): cumulative rows held by the store
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::model::RecordKind;

/// Install the Prometheus recorder with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_fetched(kind: RecordKind, rows: usize) {
    ::metrics::counter!("loader_rows_fetched_total", "kind" => kind.as_str()).increment(rows as u64);
}

pub fn record_dropped(kind: RecordKind, reason: &'static str) {
    ::metrics::counter!("loader_records_dropped_total", "kind" => kind.as_str(), "reason" => reason)
        .increment(1);
}

pub fn record_duplicates(kind: RecordKind, rows: usize) {
    ::metrics::counter!("loader_duplicates_total", "kind" => kind.as_str()).increment(rows as u64);
}

pub fn record_cycle(kind: RecordKind, outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!("loader_cycles_total", "kind" => kind.as_str(), "outcome" => outcome)
        .increment(1);
    ::metrics::histogram!("loader_cycle_duration_seconds", "kind" => kind.as_str())
        .record(elapsed.as_secs_f64());
}

pub fn record_dataset_rows(kind: RecordKind, rows: usize) {
    ::metrics::gauge!("loader_dataset_rows", "kind" => kind.as_str()).set(rows as f64);
}
