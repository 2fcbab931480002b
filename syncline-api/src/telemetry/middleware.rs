//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Provides automatic instrumentation of all HTTP requests with:
//! - tracing spans carrying the request id
//! - Prometheus metrics collection

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics;
use crate::middleware::request_id::REQUEST_ID_HEADER;

/// UUID pattern: 8-4-4-4-12 hex chars
static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("Invalid UUID regex")
});

/// Numeric ID pattern
static NUMERIC_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("Invalid ID regex"));

/// Entity lookup pattern: collapse the free-form id segment of
/// /v1/{collection}/:id routes.
static ENTITY_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/v1/(tracks|videos|podcasts|episodes|audiobooks|books|images)/[^/]+$")
        .expect("Invalid entity route regex")
});

/// Normalize path for metrics/spans (replace UUIDs and IDs with placeholders).
///
/// This prevents high-cardinality label explosion in Prometheus.
fn normalize_path(path: &str) -> String {
    if let Some(captures) = ENTITY_ID_PATTERN.captures(path) {
        return format!("/v1/{}/{{id}}", &captures[1]);
    }

    let result = UUID_PATTERN.replace_all(path, "{id}");
    let result = NUMERIC_ID_PATTERN.replace_all(&result, "/{id}$1");
    result.to_string()
}

/// Observability middleware for Axum.
///
/// This middleware wraps every request with:
/// 1. A tracing span keyed by the normalized route and request id
/// 2. Prometheus metrics recording
/// 3. Request/response logging
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
        request_id = %request_id,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    metrics::record_http_request(
        method.as_str(),
        &normalized_path,
        status.as_u16(),
        duration.as_secs_f64(),
    );

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}
