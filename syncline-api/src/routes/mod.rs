//! Gateway Routes Module
//!
//! All HTTP routes of the sync gateway:
//! - Change feed (`/v1/updates`)
//! - Single-entity lookups (`/v1/{collection}/:id`)
//! - Catalog search (`/v1/search`)
//! - Health checks (Kubernetes-compatible, not rate limited)
//! - Prometheus metrics (`/metrics`)
//! - CORS support for browser-based clients

pub mod entity;
pub mod health;
pub mod search;
pub mod updates;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::GatewayConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{rate_limit_middleware, request_id_middleware};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

// Re-export route creation functions for convenience
pub use entity::create_router as entity_router;
pub use health::create_router as health_router;
pub use search::create_router as search_router;
pub use updates::create_router as updates_router;

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Check if running in a production environment.
fn is_production_environment() -> bool {
    std::env::var("SYNCLINE_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

/// Validate gateway configuration for production use.
fn validate_config_for_production(config: &GatewayConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set SYNCLINE_CORS_ORIGINS.",
        ));
    }
    if !config.rate_limit_enabled {
        tracing::warn!(
            "Rate limiting is disabled in production - this is not recommended.\n\
             Set SYNCLINE_RATE_LIMIT_ENABLED=true to enable rate limiting."
        );
    }
    Ok(())
}

// ============================================================================
// GATEWAY ROUTER BUILDER
// ============================================================================

/// Builder for the gateway router with the full protection stack.
///
/// All `/v1` routes are rate limited; health and metrics endpoints sit
/// outside the limiter so probes and scrapers cannot be starved by client
/// traffic.
pub struct GatewayRouterBuilder {
    state: AppState,
}

impl GatewayRouterBuilder {
    /// Create a new builder.
    ///
    /// In production environments this validates that security
    /// configuration is properly set up and fails fast when it is not.
    pub fn new(state: AppState) -> ApiResult<Self> {
        if is_production_environment() {
            validate_config_for_production(&state.config)?;
        }
        Ok(Self { state })
    }

    /// Build the `/v1` surface (rate limited).
    fn build_v1_routes(&self) -> Router<AppState> {
        Router::new()
            .merge(updates::create_router())
            .merge(search::create_router())
            .merge(entity::create_router())
    }

    /// Build the complete router.
    ///
    /// # Middleware Order (outer to inner)
    /// 1. CORS (outermost) - handles preflight requests
    /// 2. Request ID - correlation before anything logs
    /// 3. Observability - tracing and metrics
    /// 4. Rate Limiting (only on /v1) - rejects floods before catalog work
    pub fn build(self) -> Router {
        let cors = build_cors_layer(&self.state.config);

        let v1_routes = self
            .build_v1_routes()
            .layer(from_fn_with_state(self.state.clone(), rate_limit_middleware));

        Router::new()
            .nest("/v1", v1_routes)
            .nest("/health", health::create_router())
            .route("/metrics", get(metrics_handler))
            .layer(from_fn(observability_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(cors)
            .with_state(self.state)
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from GatewayConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &GatewayConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::IF_NONE_MATCH,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([
            header::ETAG,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderName::from_static("retry-after"),
        ])
        .max_age(Duration::from_secs(3600));

    if config.cors_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        cors.allow_origin(origins)
    }
}
