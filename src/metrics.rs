// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the search gateway.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The binary (or embedding service) chooses the exporter.
//!
//! # Metric Naming Convention
//! - `search_gateway_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `endpoint`: search, batch_search, specialist, advanced_search
//! - `backend`: elasticsearch, memory
//! - `status`: success, invalid, bad_request, error, rejected

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a handled search request
pub fn record_search(endpoint: &str, status: &str) {
    counter!(
        "search_gateway_searches_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record end-to-end request latency
pub fn record_latency(endpoint: &str, duration: Duration) {
    histogram!(
        "search_gateway_search_seconds",
        "endpoint" => endpoint.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record the number of results returned for one search
pub fn record_search_results(count: usize) {
    histogram!("search_gateway_search_results").record(count as f64);
}

/// Record a call to the search engine
pub fn record_engine_call(backend: &str, status: &str) {
    counter!(
        "search_gateway_engine_calls_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_engine_latency(backend: &str, duration: Duration) {
    histogram!(
        "search_gateway_engine_seconds",
        "backend" => backend.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a rejected request (`kind` is `invalid` or `bad_request`)
pub fn record_validation_error(endpoint: &str, kind: &str) {
    counter!(
        "search_gateway_validation_errors_total",
        "endpoint" => endpoint.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record the size of a batch request
pub fn record_batch(size: usize) {
    histogram!("search_gateway_batch_size").record(size as f64);
}

/// Record which kind of best bet applied to a query
pub fn record_best_bets(query_match: &str) {
    counter!(
        "search_gateway_best_bets_total",
        "match" => query_match.to_string()
    )
    .increment(1);
}

/// Record a registry refresh
pub fn record_registry_refresh(registry: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "search_gateway_registry_refreshes_total",
        "registry" => registry.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn set_registry_entries(registry: &str, count: usize) {
    gauge!(
        "search_gateway_registry_entries",
        "registry" => registry.to_string()
    )
    .set(count as f64);
}

/// Record circuit breaker state (0 = closed, 1 = half open, 2 = open)
pub fn set_circuit_state(circuit: &str, state: u8) {
    gauge!(
        "search_gateway_circuit_breaker_state",
        "circuit" => circuit.to_string()
    )
    .set(state as f64);
}

/// Record circuit breaker call
pub fn record_circuit_breaker_call(circuit: &str, outcome: &str) {
    counter!(
        "search_gateway_circuit_breaker_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a result whose optional decoration failed
pub fn record_decoration_failure(field: &str) {
    counter!(
        "search_gateway_decoration_failures_total",
        "field" => field.to_string()
    )
    .increment(1);
}

/// Record startup duration
pub fn record_startup(duration: Duration) {
    histogram!("search_gateway_startup_seconds").record(duration.as_secs_f64());
}

/// A timing guard that records request latency on drop
pub struct LatencyTimer {
    endpoint: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.endpoint, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These verify the API doesn't panic without an installed recorder.

    #[test]
    fn test_request_metrics() {
        record_search("search", "success");
        record_search("batch_search", "invalid");
        record_latency("search", Duration::from_millis(3));
        record_search_results(10);
        record_validation_error("search", "bad_request");
        record_batch(4);
    }

    #[test]
    fn test_engine_metrics() {
        record_engine_call("elasticsearch", "success");
        record_engine_call("elasticsearch", "timeout");
        record_engine_latency("memory", Duration::from_micros(200));
        set_circuit_state("elasticsearch", 2);
        record_circuit_breaker_call("elasticsearch", "rejected");
    }

    #[test]
    fn test_registry_metrics() {
        record_registry_refresh("organisation", true);
        record_registry_refresh("topic", false);
        set_registry_entries("organisation", 1200);
        record_best_bets("exact");
        record_decoration_failure("expanded_organisations");
    }

    #[test]
    fn test_latency_timer() {
        {
            let _timer = LatencyTimer::new("search");
            std::thread::sleep(Duration::from_micros(10));
        }
    }
}
