//! Connector metrics

use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static::lazy_static! {
    pub static ref CONNECTOR_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "connector_requests_total",
        "Total connector requests",
        &["bank", "operation", "status"]
    )
    .unwrap();

    pub static ref CONNECTOR_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "connector_request_duration_seconds",
        "Connector request duration",
        &["bank", "operation"]
    )
    .unwrap();
}
