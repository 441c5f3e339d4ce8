use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter_vec, register_int_gauge,
    GaugeVec, Histogram, IntCounterVec, IntGauge,
};

lazy_static::lazy_static! {
    pub static ref COMPARISONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "marquee_comparisons_total", "Index comparison runs", &["status"]
    ).unwrap();
    pub static ref COMPARISON_DURATION: Histogram = register_histogram!(
        "marquee_comparison_duration_seconds", "End-to-end index comparison duration",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();
    pub static ref MEDIAN_LATENCY_MS: GaugeVec = register_gauge_vec!(
        "marquee_median_latency_ms", "Median query latency of the last comparison", &["collection", "phase"]
    ).unwrap();
    pub static ref ACTIVE_COMPARISONS: IntGauge = register_int_gauge!(
        "marquee_active_comparisons", "Comparisons currently running"
    ).unwrap();
    pub static ref PROVISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "marquee_demo_provisions_total", "Demo collection provisioning outcomes", &["method"]
    ).unwrap();
}

pub fn init() {
    lazy_static::initialize(&COMPARISONS_TOTAL);
    lazy_static::initialize(&COMPARISON_DURATION);
    lazy_static::initialize(&MEDIAN_LATENCY_MS);
    lazy_static::initialize(&ACTIVE_COMPARISONS);
    lazy_static::initialize(&PROVISIONS_TOTAL);
}

/// Decrements the gauge when dropped.
pub struct GaugeGuard<'a>(pub &'a IntGauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}
