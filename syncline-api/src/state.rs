//! Shared application state for Axum routers.

use std::sync::Arc;

use tokio::task::JoinHandle;

use syncline_store::{BreakerPolicy, CacheStore, CircuitBreaker, RateLimitConfig, RateLimitStore};

use crate::catalog::CatalogSource;
use crate::config::GatewayConfig;
use crate::telemetry::metrics;
use crate::types::EntityResponse;

/// Type alias for the entity response cache.
///
/// Values are fully-built response bodies: a cache hit skips both the
/// catalog call and the ETag computation.
pub type EntityCache = CacheStore<EntityResponse>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Catalog backend, behind the trait seam so tests can substitute
    /// flaky or scripted sources.
    pub catalog: Arc<dyn CatalogSource>,
    pub entity_cache: Arc<EntityCache>,
    pub rate_limiter: Arc<RateLimitStore>,
    pub breaker: Arc<CircuitBreaker>,
    pub config: Arc<GatewayConfig>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire up gateway state from configuration.
    ///
    /// The circuit breaker reports transitions into the metrics registry.
    pub fn new(catalog: Arc<dyn CatalogSource>, config: GatewayConfig) -> Self {
        let breaker = CircuitBreaker::with_observer(|key: &str, transition| {
            metrics::record_circuit_transition(key, transition.as_str());
        });

        Self {
            entity_cache: Arc::new(CacheStore::new(config.cache_max_entries)),
            rate_limiter: Arc::new(RateLimitStore::new()),
            breaker: Arc::new(breaker),
            config: Arc::new(config),
            catalog,
            start_time: std::time::Instant::now(),
        }
    }

    /// Rate-limit parameters derived from configuration.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: self.config.rate_limit_window,
            max_requests: self.config.rate_limit_max_requests,
        }
    }

    /// Circuit-breaker policy derived from configuration.
    pub fn breaker_policy(&self) -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: self.config.breaker_failure_threshold,
            open_timeout: self.config.breaker_open_timeout,
        }
    }

    /// Start the background sweep that purges expired cache entries.
    pub fn spawn_cache_sweeper(&self) -> JoinHandle<()> {
        self.entity_cache
            .spawn_sweeper(self.config.cache_sweep_interval)
    }
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(Arc<dyn CatalogSource>, catalog);
crate::impl_from_ref!(Arc<EntityCache>, entity_cache);
crate::impl_from_ref!(Arc<RateLimitStore>, rate_limiter);
crate::impl_from_ref!(Arc<CircuitBreaker>, breaker);
crate::impl_from_ref!(Arc<GatewayConfig>, config);
crate::impl_from_ref!(std::time::Instant, start_time);
