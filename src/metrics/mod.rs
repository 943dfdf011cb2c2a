//! Metrics module
//!
//! Prometheus counters and histograms for asset uploads, part transfers and
//! retries. Everything registers in the default registry.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // Asset metrics
    pub static ref ASSETS_TOTAL: CounterVec = register_counter_vec!(
        "asset_uploadr_assets_total",
        "Total number of asset uploads",
        &["status"]
    ).unwrap();

    pub static ref ASSET_FAILURES: CounterVec = register_counter_vec!(
        "asset_uploadr_asset_failures_total",
        "Failed asset uploads by stage",
        &["stage"]
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "asset_uploadr_upload_duration_seconds",
        "Asset upload duration in seconds",
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    pub static ref ASSET_PARTS: Histogram = register_histogram!(
        "asset_uploadr_asset_parts",
        "Number of parts per asset",
        vec![1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 500.0]
    ).unwrap();

    // Part metrics
    pub static ref PARTS_TOTAL: CounterVec = register_counter_vec!(
        "asset_uploadr_parts_total",
        "Total part transfers",
        &["status"]
    ).unwrap();

    pub static ref PART_BYTES_TOTAL: Counter = register_counter!(
        "asset_uploadr_part_bytes_total",
        "Total bytes transferred in parts"
    ).unwrap();

    pub static ref PART_DURATION: HistogramVec = register_histogram_vec!(
        "asset_uploadr_part_duration_seconds",
        "Part transfer duration in seconds",
        &["status"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0]
    ).unwrap();

    // Retry metrics
    pub static ref RETRIES_TOTAL: CounterVec = register_counter_vec!(
        "asset_uploadr_retries_total",
        "Retries by policy",
        &["policy"]  // "rate_limit" or "lookup"
    ).unwrap();
}

/// Record a confirmed asset upload
pub fn record_asset_success(parts_count: usize, duration_secs: f64) {
    ASSETS_TOTAL.with_label_values(&["success"]).inc();
    ASSET_PARTS.observe(parts_count as f64);
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record a failed asset upload
pub fn record_asset_failure(stage: &str) {
    ASSETS_TOTAL.with_label_values(&["failure"]).inc();
    ASSET_FAILURES.with_label_values(&[stage]).inc();
}

/// Record one part transfer
pub fn record_part(bytes: u64, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "failure" };
    PARTS_TOTAL.with_label_values(&[status]).inc();
    PART_DURATION
        .with_label_values(&[status])
        .observe(duration_secs);

    if success {
        PART_BYTES_TOTAL.inc_by(bytes as f64);
    }
}

/// Record a rate-limit rejection that triggers a backoff
pub fn record_rate_limited() {
    RETRIES_TOTAL.with_label_values(&["rate_limit"]).inc();
}

/// Record a retried lookup
pub fn record_lookup_retry() {
    RETRIES_TOTAL.with_label_values(&["lookup"]).inc();
}

/// Render the default registry in the Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
