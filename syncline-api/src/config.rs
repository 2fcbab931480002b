//! Gateway Configuration Module
//!
//! Configuration for admission control, caching, resilience, and CORS.
//! Loaded from environment variables with sensible defaults for
//! development.

use std::time::Duration;

// ============================================================================
// GATEWAY CONFIGURATION
// ============================================================================

/// Gateway configuration for rate limiting, caching, resilience, and CORS.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    // ========================================================================
    // Rate Limiting
    // ========================================================================
    /// Whether rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Fixed window size.
    pub rate_limit_window: Duration,

    /// Requests allowed per key per window.
    pub rate_limit_max_requests: u32,

    // ========================================================================
    // Caching
    // ========================================================================
    /// Capacity bound of the entity response cache.
    pub cache_max_entries: usize,

    /// TTL for cached entity responses.
    pub cache_entity_ttl: Duration,

    /// Interval of the background sweep for expired entries.
    pub cache_sweep_interval: Duration,

    // ========================================================================
    // Resilience
    // ========================================================================
    /// Total attempts for retried catalog reads.
    pub retry_max_attempts: u32,

    /// Backoff before the first retry (doubles per attempt).
    pub retry_initial_delay: Duration,

    /// Per-call budget for catalog operations.
    pub upstream_timeout: Duration,

    /// Consecutive failures before the circuit opens.
    pub breaker_failure_threshold: u32,

    /// Cooldown before an open circuit allows a trial call.
    pub breaker_open_timeout: Duration,

    // ========================================================================
    // CORS
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate_limit_enabled: true,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 120,

            cache_max_entries: 10_000,
            cache_entity_ttl: Duration::from_secs(300),
            cache_sweep_interval: Duration::from_secs(60),

            retry_max_attempts: 3,
            retry_initial_delay: Duration::from_millis(100),
            upstream_timeout: Duration::from_secs(5),
            breaker_failure_threshold: 5,
            breaker_open_timeout: Duration::from_secs(30),

            cors_origins: Vec::new(), // Empty = allow all
        }
    }
}

impl GatewayConfig {
    /// Create GatewayConfig from environment variables.
    ///
    /// Environment variables (all optional):
    /// - `SYNCLINE_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `SYNCLINE_RATE_LIMIT_WINDOW_MS`: window size (default: 60000)
    /// - `SYNCLINE_RATE_LIMIT_MAX_REQUESTS`: requests per window (default: 120)
    /// - `SYNCLINE_CACHE_MAX_ENTRIES`: cache capacity (default: 10000)
    /// - `SYNCLINE_CACHE_ENTITY_TTL_MS`: entity cache TTL (default: 300000)
    /// - `SYNCLINE_CACHE_SWEEP_INTERVAL_MS`: sweep interval (default: 60000)
    /// - `SYNCLINE_RETRY_MAX_ATTEMPTS`: retry attempts (default: 3)
    /// - `SYNCLINE_RETRY_INITIAL_DELAY_MS`: first backoff (default: 100)
    /// - `SYNCLINE_UPSTREAM_TIMEOUT_MS`: catalog call budget (default: 5000)
    /// - `SYNCLINE_BREAKER_FAILURE_THRESHOLD`: trip threshold (default: 5)
    /// - `SYNCLINE_BREAKER_OPEN_TIMEOUT_MS`: cooldown (default: 30000)
    /// - `SYNCLINE_CORS_ORIGINS`: comma-separated origins (empty = allow all)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            rate_limit_enabled: env_bool("SYNCLINE_RATE_LIMIT_ENABLED", defaults.rate_limit_enabled),
            rate_limit_window: env_duration_ms(
                "SYNCLINE_RATE_LIMIT_WINDOW_MS",
                defaults.rate_limit_window,
            ),
            rate_limit_max_requests: env_parse(
                "SYNCLINE_RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            cache_max_entries: env_parse("SYNCLINE_CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_entity_ttl: env_duration_ms(
                "SYNCLINE_CACHE_ENTITY_TTL_MS",
                defaults.cache_entity_ttl,
            ),
            cache_sweep_interval: env_duration_ms(
                "SYNCLINE_CACHE_SWEEP_INTERVAL_MS",
                defaults.cache_sweep_interval,
            ),
            retry_max_attempts: env_parse("SYNCLINE_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts),
            retry_initial_delay: env_duration_ms(
                "SYNCLINE_RETRY_INITIAL_DELAY_MS",
                defaults.retry_initial_delay,
            ),
            upstream_timeout: env_duration_ms(
                "SYNCLINE_UPSTREAM_TIMEOUT_MS",
                defaults.upstream_timeout,
            ),
            breaker_failure_threshold: env_parse(
                "SYNCLINE_BREAKER_FAILURE_THRESHOLD",
                defaults.breaker_failure_threshold,
            ),
            breaker_open_timeout: env_duration_ms(
                "SYNCLINE_BREAKER_OPEN_TIMEOUT_MS",
                defaults.breaker_open_timeout,
            ),
            cors_origins: std::env::var("SYNCLINE_CORS_ORIGINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|s| s.to_lowercase() != "false")
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
