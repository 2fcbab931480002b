//! Prometheus Metrics Definitions
//!
//! Defines all Syncline gateway metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Catalog operation latency buckets (seconds)
const CATALOG_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<SynclineMetrics>> = Lazy::new(SynclineMetrics::new);

/// Container for all Syncline gateway metrics.
#[derive(Clone)]
pub struct SynclineMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Catalog operation counter - labels: operation, status
    pub catalog_operations_total: CounterVec,

    /// Catalog operation duration histogram - labels: operation
    pub catalog_operation_duration_seconds: HistogramVec,

    /// Rate-limit denial counter - labels: route
    pub rate_limit_denials_total: CounterVec,

    /// Entity cache lookup counter - labels: outcome (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// Circuit breaker transition counter - labels: key, transition
    pub circuit_transitions_total: CounterVec,
}

impl SynclineMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "syncline_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register http_requests_total: {}", e))
            })?,

            http_request_duration_seconds: register_histogram_vec!(
                "syncline_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to register http_request_duration_seconds: {}",
                    e
                ))
            })?,

            catalog_operations_total: register_counter_vec!(
                "syncline_catalog_operations_total",
                "Total number of catalog operations",
                &["operation", "status"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to register catalog_operations_total: {}",
                    e
                ))
            })?,

            catalog_operation_duration_seconds: register_histogram_vec!(
                "syncline_catalog_operation_duration_seconds",
                "Catalog operation duration in seconds",
                &["operation"],
                CATALOG_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to register catalog_operation_duration_seconds: {}",
                    e
                ))
            })?,

            rate_limit_denials_total: register_counter_vec!(
                "syncline_rate_limit_denials_total",
                "Requests rejected by the rate limiter",
                &["route"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to register rate_limit_denials_total: {}",
                    e
                ))
            })?,

            cache_lookups_total: register_counter_vec!(
                "syncline_cache_lookups_total",
                "Entity cache lookups by outcome",
                &["outcome"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register cache_lookups_total: {}", e))
            })?,

            circuit_transitions_total: register_counter_vec!(
                "syncline_circuit_transitions_total",
                "Circuit breaker state transitions",
                &["key", "transition"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to register circuit_transitions_total: {}",
                    e
                ))
            })?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a catalog operation.
    pub fn record_catalog_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.catalog_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.catalog_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Record a rate-limit denial.
    pub fn record_rate_limit_denial(&self, route: &str) {
        self.rate_limit_denials_total
            .with_label_values(&[route])
            .inc();
    }

    /// Record an entity cache lookup outcome.
    pub fn record_cache_lookup(&self, hit: bool) {
        let outcome = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[outcome]).inc();
    }

    /// Record a circuit breaker transition.
    pub fn record_circuit_transition(&self, key: &str, transition: &str) {
        self.circuit_transitions_total
            .with_label_values(&[key, transition])
            .inc();
    }
}

// Free-function wrappers so call sites do not have to thread the registry
// through; a failed registration degrades to no-op recording.

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(method, path, status, duration_secs);
    }
}

pub fn record_catalog_operation(operation: &str, success: bool, duration_secs: f64) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_catalog_operation(operation, success, duration_secs);
    }
}

pub fn record_rate_limit_denial(route: &str) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_rate_limit_denial(route);
    }
}

pub fn record_cache_lookup(hit: bool) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_cache_lookup(hit);
    }
}

pub fn record_circuit_transition(key: &str, transition: &str) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_circuit_transition(key, transition);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
