//! Rate Limiting Middleware
//!
//! Fixed-window admission control keyed by client IP:
//! - Allowed requests carry `X-RateLimit-Limit`, `X-RateLimit-Remaining`,
//!   and `X-RateLimit-Reset` headers
//! - Denied requests get `429 Too Many Requests` with a `Retry-After`
//!   header and a JSON body describing the denial
//!
//! A backend failure in the limiter fails open: admission control is
//! protection, not a correctness gate.

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::IpAddr;

use syncline_store::RateLimitDecision;

use crate::state::AppState;
use crate::telemetry::metrics;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Error type for rate limit denials.
pub struct RateLimitError {
    /// Seconds until the window resets
    pub retry_after: u64,
    pub limit: u32,
    pub reset_epoch: i64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let error = crate::error::ApiError::too_many_requests(self.retry_after);
        let status = StatusCode::TOO_MANY_REQUESTS;

        let mut response = (status, axum::Json(error)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        insert_limit_headers(headers, self.limit, 0, self.reset_epoch);

        response
    }
}

/// Extract the client key from proxy headers, falling back to the
/// connection address when no proxy header is present.
fn extract_client_key(request: &Request) -> String {
    // X-Forwarded-For can contain multiple IPs, take the first one
    if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first_ip) = forwarded_for.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        if let Ok(ip) = real_ip.trim().parse::<IpAddr>() {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn insert_limit_headers(
    headers: &mut axum::http::HeaderMap,
    limit: u32,
    remaining: u32,
    reset_epoch: i64,
) {
    let pairs = [
        (HEADER_LIMIT, limit.to_string()),
        (HEADER_REMAINING, remaining.to_string()),
        (HEADER_RESET, reset_epoch.to_string()),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}

/// Rate limiting middleware.
///
/// Keys on client IP (proxy-aware) and enforces the configured
/// requests-per-window budget. When rate limited, returns 429 Too Many
/// Requests with Retry-After and the standard X-RateLimit-* headers.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let key = extract_client_key(&request);
    let config = state.rate_limit_config();
    let decision = state.rate_limiter.check_limit(&key, &config);

    let RateLimitDecision {
        allowed,
        remaining,
        reset_at,
        retry_after_secs,
    } = decision;

    if !allowed {
        let route = request.uri().path().to_string();
        metrics::record_rate_limit_denial(&route);
        tracing::warn!(key = %key, route = %route, "rate limit exceeded");
        return Err(RateLimitError {
            retry_after: retry_after_secs.unwrap_or(1),
            limit: config.max_requests,
            reset_epoch: reset_at.timestamp(),
        });
    }

    let mut response = next.run(request).await;
    insert_limit_headers(
        response.headers_mut(),
        config.max_requests,
        remaining,
        reset_at.timestamp(),
    );
    Ok(response)
}
