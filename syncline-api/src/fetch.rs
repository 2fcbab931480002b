//! Guarded Catalog Access
//!
//! Single place where routes call the catalog collaborator. Every call runs
//! through the full protection stack, innermost first:
//!
//! 1. retry with exponential backoff (idempotent reads only)
//! 2. timeout race (the losing attempt is detached, not cancelled)
//! 3. keyed circuit breaker
//!
//! Outcomes are mapped onto the protocol error taxonomy here so handlers
//! only ever see `ApiError`.

use std::future::Future;

use syncline_store::{with_retry, with_timeout, ResilienceError};

use crate::catalog::CatalogError;
use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::metrics;

/// Circuit key for single-entity lookups.
pub const CIRCUIT_ENTITY: &str = "catalog.entity";
/// Circuit key for catalog search.
pub const CIRCUIT_SEARCH: &str = "catalog.search";
/// Circuit key for the change feed.
pub const CIRCUIT_UPDATES: &str = "catalog.updates";

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::external_service(err.to_string())
    }
}

/// Run a catalog read through retry, timeout, and the circuit for
/// `circuit_key`. `make_op` is invoked once per attempt and must be
/// side-effect free.
pub async fn guarded_fetch<T, F, Fut>(
    state: &AppState,
    circuit_key: &'static str,
    operation: &'static str,
    make_op: F,
) -> Result<T, ApiError>
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CatalogError>> + Send + 'static,
    T: Send + 'static,
{
    let max_attempts = state.config.retry_max_attempts;
    let initial_delay = state.config.retry_initial_delay;
    let timeout = state.config.upstream_timeout;
    let policy = state.breaker_policy();
    let started = std::time::Instant::now();

    let attempt = || {
        let make_op = make_op.clone();
        async move {
            let raced = with_timeout(
                async move { with_retry(make_op, max_attempts, initial_delay).await },
                timeout,
            )
            .await;

            match raced {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(ResilienceError::Exhausted { attempts, source })) => {
                    tracing::warn!(
                        operation,
                        attempts,
                        error = %source,
                        "catalog read exhausted retries"
                    );
                    Err(ApiError::from(source))
                }
                // with_retry only ever fails with Exhausted; timeouts come
                // from the outer race.
                Ok(Err(other)) => Err(ApiError::external_service(other.to_string())),
                Err(ResilienceError::Timeout { .. }) => Err(ApiError::timeout(operation)),
                Err(other) => Err(ApiError::external_service(other.to_string())),
            }
        }
    };

    let outcome = state.breaker.call(circuit_key, &policy, attempt).await;
    let duration = started.elapsed().as_secs_f64();

    match outcome {
        Ok(value) => {
            metrics::record_catalog_operation(operation, true, duration);
            Ok(value)
        }
        Err(ResilienceError::CircuitOpen { key, retry_after }) => {
            metrics::record_catalog_operation(operation, false, duration);
            tracing::warn!(key = %key, operation, "catalog circuit open, short-circuiting");
            Err(ApiError::circuit_open(retry_after.as_secs().max(1)))
        }
        Err(ResilienceError::Exhausted { source, .. }) => {
            metrics::record_catalog_operation(operation, false, duration);
            Err(source)
        }
        Err(ResilienceError::Timeout { .. }) => {
            metrics::record_catalog_operation(operation, false, duration);
            Err(ApiError::timeout(operation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::config::GatewayConfig;
    use crate::error::ErrorCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_state() -> AppState {
        let config = GatewayConfig {
            retry_max_attempts: 3,
            retry_initial_delay: Duration::from_millis(10),
            upstream_timeout: Duration::from_millis(500),
            breaker_failure_threshold: 2,
            breaker_open_timeout: Duration::from_secs(30),
            ..GatewayConfig::default()
        };
        AppState::new(Arc::new(InMemoryCatalog::new()), config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_guarded_fetch_retries_transient_failures() {
        let state = test_state();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = guarded_fetch(&state, "test.retry", "test", move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CatalogError::Unavailable {
                        reason: "flaky".to_string(),
                    })
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guarded_fetch_maps_timeout_to_504() {
        let state = test_state();

        let result: Result<u32, _> = guarded_fetch(&state, "test.timeout", "test", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        })
        .await;

        let err = result.expect_err("must time out");
        assert_eq!(err.code, ErrorCode::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guarded_fetch_opens_circuit_and_short_circuits() {
        let state = test_state();

        for _ in 0..2 {
            let result: Result<u32, _> =
                guarded_fetch(&state, "test.breaker", "test", || async {
                    Err(CatalogError::Unavailable {
                        reason: "down".to_string(),
                    })
                })
                .await;
            assert_eq!(
                result.expect_err("must fail").code,
                ErrorCode::ExternalServiceError
            );
        }

        // Circuit is open now: next call short-circuits with 503.
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<u32, _> = guarded_fetch(&state, "test.breaker", "test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(1) }
        })
        .await;

        let err = result.expect_err("circuit must be open");
        assert_eq!(err.code, ErrorCode::CircuitOpen);
        assert!(err.retry_after.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
