//! Engine metrics

use prometheus::{register_counter_vec, register_int_gauge, CounterVec, IntGauge};

lazy_static::lazy_static! {
    pub static ref RUNS_TOTAL: CounterVec = register_counter_vec!(
        "treasury_runs_total",
        "Consolidation runs by terminal status",
        &["status"]
    )
    .unwrap();

    pub static ref TRANSFERS_TOTAL: CounterVec = register_counter_vec!(
        "treasury_transfers_total",
        "Transfers executed by kind and outcome",
        &["kind", "outcome"]
    )
    .unwrap();

    pub static ref RECONCILE_TOTAL: CounterVec = register_counter_vec!(
        "treasury_reconcile_total",
        "Reconciliation attempts by result",
        &["result"]
    )
    .unwrap();

    pub static ref PENDING_TRANSFERS: IntGauge = register_int_gauge!(
        "treasury_pending_transfers",
        "Pending transfers currently tracked"
    )
    .unwrap();
}
