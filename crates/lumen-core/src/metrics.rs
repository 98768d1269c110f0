//! Process-global Prometheus metrics for explanation requests.

use once_cell::sync::Lazy;
use prometheus::{Counter, CounterVec, Encoder, Histogram, Opts, TextEncoder};

pub static EXPLAIN_REQUESTS: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new("lumen_explain_requests_total", "Total explanation requests").unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

pub static EXPLAIN_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    let c = CounterVec::new(
        Opts::new(
            "lumen_explain_failures_total",
            "Failed explanation requests by error kind",
        ),
        &["kind"],
    )
    .unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

pub static SENSOR_FALLBACK_TOTAL: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new(
        "lumen_sensor_fallback_total",
        "Sensor selections that fell back to sensor 0 on undefined attribution",
    )
    .unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

pub static COMPUTE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    let h = Histogram::with_opts(prometheus::HistogramOpts::new(
        "lumen_compute_duration_seconds",
        "Histogram of prototype computation latency",
    ))
    .unwrap();
    prometheus::register(Box::new(h.clone())).unwrap();
    h
});

/// Text exposition of every registered metric
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
