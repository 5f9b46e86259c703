//! Prometheus Metrics
//!
//! Counters and latency histograms exposed at `/metrics`.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder and register metric help text.
///
/// Idempotent: repeated calls return the same handle.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("another metrics recorder is already installed");

            describe_counter!("samvad_requests_total", "Requests handled, by route");
            describe_counter!("samvad_errors_total", "Failed requests, by error kind");
            describe_counter!(
                "samvad_persistence_failures_total",
                "Transcript appends that failed, by turn stage"
            );
            describe_histogram!(
                "samvad_generation_latency_ms",
                Unit::Milliseconds,
                "Model generation latency"
            );
            describe_histogram!(
                "samvad_voice_turn_latency_ms",
                Unit::Milliseconds,
                "Full voice cycle latency, capture to audio"
            );

            handle
        })
        .clone()
}

/// Render the Prometheus exposition text
pub async fn metrics_handler() -> String {
    match PROMETHEUS.get() {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}

pub fn record_request(route: &'static str) {
    counter!("samvad_requests_total", "route" => route).increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!("samvad_errors_total", "kind" => kind).increment(1);
}

/// A transcript append failed; `stage` is which turn was being recorded
pub fn record_persistence_failure(stage: &'static str) {
    counter!("samvad_persistence_failures_total", "stage" => stage).increment(1);
}

pub fn record_generation_latency(ms: u64) {
    histogram!("samvad_generation_latency_ms").record(ms as f64);
}

pub fn record_voice_latency(ms: u64) {
    histogram!("samvad_voice_turn_latency_ms").record(ms as f64);
}
