//! Prometheus Metrics Module
//!
//! Relay-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Relayed message counts by relay
//! - Skipped records, publish failures and buffer rejections
//! - Persisted documents and commit failures
//! - Relay tick duration histograms

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Messages moved from one system to the next, by relay
pub static RELAYED_MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relayed_messages_total", "Total number of relayed messages").namespace("chat_relay"),
        &["relay"],
    )
    .expect("Failed to create RELAYED_MESSAGES_TOTAL metric")
});

/// Publishes that resolved with an error
pub static PUBLISH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("publish_failures_total", "Total number of failed publishes").namespace("chat_relay"),
        &["topic"],
    )
    .expect("Failed to create PUBLISH_FAILURES_TOTAL metric")
});

/// Records dropped as unusable, by relay
pub static SKIPPED_RECORDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("skipped_records_total", "Total number of records dropped as malformed").namespace("chat_relay"),
        &["relay"],
    )
    .expect("Failed to create SKIPPED_RECORDS_TOTAL metric")
});

/// Sends rejected by a full producer buffer
pub static BUFFER_REJECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("buffer_rejections_total", "Sends rejected by a full producer buffer").namespace("chat_relay"),
    )
    .expect("Failed to create BUFFER_REJECTIONS_TOTAL metric")
});

/// Documents written to the document store
pub static PERSISTED_DOCUMENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("persisted_documents_total", "Total number of persisted chat messages").namespace("chat_relay"),
    )
    .expect("Failed to create PERSISTED_DOCUMENTS_TOTAL metric")
});

/// Offset commits that failed and were swallowed
pub static COMMIT_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("commit_failures_total", "Total number of failed offset commits").namespace("chat_relay"),
    )
    .expect("Failed to create COMMIT_FAILURES_TOTAL metric")
});

/// Relay tick duration histogram
pub static TICK_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];
    HistogramVec::new(
        HistogramOpts::new("tick_duration_seconds", "Relay tick duration in seconds")
            .namespace("chat_relay")
            .buckets(buckets),
        &["relay"],
    )
    .expect("Failed to create TICK_DURATION_SECONDS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(RELAYED_MESSAGES_TOTAL.clone()))
        .expect("Failed to register RELAYED_MESSAGES_TOTAL");
    registry
        .register(Box::new(PUBLISH_FAILURES_TOTAL.clone()))
        .expect("Failed to register PUBLISH_FAILURES_TOTAL");
    registry
        .register(Box::new(SKIPPED_RECORDS_TOTAL.clone()))
        .expect("Failed to register SKIPPED_RECORDS_TOTAL");
    registry
        .register(Box::new(BUFFER_REJECTIONS_TOTAL.clone()))
        .expect("Failed to register BUFFER_REJECTIONS_TOTAL");
    registry
        .register(Box::new(PERSISTED_DOCUMENTS_TOTAL.clone()))
        .expect("Failed to register PERSISTED_DOCUMENTS_TOTAL");
    registry
        .register(Box::new(COMMIT_FAILURES_TOTAL.clone()))
        .expect("Failed to register COMMIT_FAILURES_TOTAL");
    registry
        .register(Box::new(TICK_DURATION_SECONDS.clone()))
        .expect("Failed to register TICK_DURATION_SECONDS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %err, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record relayed messages
pub fn record_relayed(relay: &str, count: usize) {
    RELAYED_MESSAGES_TOTAL
        .with_label_values(&[relay])
        .inc_by(count as u64);
}

/// Helper to record a failed publish
pub fn record_publish_failure(topic: &str) {
    PUBLISH_FAILURES_TOTAL.with_label_values(&[topic]).inc();
}

pub fn record_skipped(relay: &str, count: usize) {
    if count > 0 {
        SKIPPED_RECORDS_TOTAL.with_label_values(&[relay]).inc_by(count as u64);
    }
}

pub fn record_buffer_rejection() {
    BUFFER_REJECTIONS_TOTAL.inc();
}

pub fn record_persisted(count: usize) {
    PERSISTED_DOCUMENTS_TOTAL.inc_by(count as u64);
}

pub fn record_commit_failure() {
    COMMIT_FAILURES_TOTAL.inc();
}

/// Helper to record relay tick duration
pub fn record_tick(relay: &str, duration_secs: f64) {
    TICK_DURATION_SECONDS
        .with_label_values(&[relay])
        .observe(duration_secs);
}
