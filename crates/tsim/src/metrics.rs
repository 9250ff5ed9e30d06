//! Prometheus metrics for the simulation loop

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, Histogram, IntCounterVec,
};

const LABEL_OUTCOME: &str = "outcome";

/// Recompute requests, by outcome (`computed` or `skipped`)
static RECOMPUTES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tsim_recomputes_total",
        "Cost model recompute requests",
        &[LABEL_OUTCOME]
    )
    .expect("Failed to register recomputes_total metric")
});

static RECOMPUTE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tsim_recompute_latency_seconds",
        "Time spent inside the cost model per recompute",
        vec![0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005]
    )
    .expect("Failed to register recompute_latency_seconds metric")
});

pub fn record_recompute(latency_ms: f64) {
    RECOMPUTES_TOTAL.with_label_values(&["computed"]).inc();
    RECOMPUTE_LATENCY.observe(latency_ms / 1000.0);
}

pub fn record_skipped() {
    RECOMPUTES_TOTAL.with_label_values(&["skipped"]).inc();
}
