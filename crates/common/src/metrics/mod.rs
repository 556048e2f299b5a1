//! Metrics and observability utilities
//!
//! Prometheus metrics with SLO-aligned histograms, all named under
//! [`METRICS_PREFIX`].

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Chairs metrics
pub const METRICS_PREFIX: &str = "chairs";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.075,  // 75ms
    0.100,  // 100ms
    0.150,  // 150ms - P99 target
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for chain searches, which grow steeply with maxLen
pub const CHAIN_SEARCH_BUCKETS: &[f64] = &[
    0.001,
    0.010,
    0.050,
    0.100,
    0.500,
    1.000,
    5.000,
    15.00,
    30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_chain_searches_total", METRICS_PREFIX),
        Unit::Count,
        "Chain computations by outcome"
    );

    describe_histogram!(
        format!("{}_chain_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chain computation latency in seconds"
    );

    describe_histogram!(
        format!("{}_chains_found", METRICS_PREFIX),
        Unit::Count,
        "Chains returned per computation"
    );

    describe_counter!(
        format!("{}_graph_engine_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Requests sent to the graph engine"
    );

    describe_histogram!(
        format!("{}_graph_engine_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Graph engine call latency in seconds"
    );

    describe_counter!(
        format!("{}_audit_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Audit log writes that failed"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one chain computation
pub fn record_chain_search(duration_secs: f64, chains_found: usize, outcome: &str) {
    counter!(
        format!("{}_chain_searches_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_chain_search_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    histogram!(format!("{}_chains_found", METRICS_PREFIX)).record(chains_found as f64);
}

/// Record one call to the graph engine
pub fn record_graph_engine_call(endpoint: &str, status: &str, duration_secs: f64) {
    counter!(
        format!("{}_graph_engine_requests_total", METRICS_PREFIX),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_graph_engine_duration_seconds", METRICS_PREFIX),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

pub fn record_audit_failure(action: &str) {
    counter!(
        format!("{}_audit_failures_total", METRICS_PREFIX),
        "action" => action.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_are_sorted() {
        for buckets in [LATENCY_BUCKETS, CHAIN_SEARCH_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }

        assert!(LATENCY_BUCKETS.contains(&0.050));
        assert!(LATENCY_BUCKETS.contains(&0.150));
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every call is a no-op
        let metrics = RequestMetrics::start("POST", "/api/admin/graph/chains");
        metrics.finish(200);
        record_chain_search(0.01, 3, "ok");
        record_graph_engine_call("/build-graph", "ok", 0.2);
        record_audit_failure("graph_sync");
    }
}
