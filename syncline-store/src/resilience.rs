//! Resilience executor: retry, timeout race, circuit breaker
//!
//! Generic wrappers around asynchronous operations. Outcomes are explicit
//! values ([`ResilienceError`]), never panics: circuit-open and timeout are
//! expected control flow for the gateway, which maps them onto protocol
//! statuses.
//!
//! Retries are meant for idempotent reads only; callers must not wrap
//! mutating operations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Failure modes of a wrapped operation.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// Every retry attempt failed; carries the final error.
    #[error("operation failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The timer won the race.
    #[error("operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The circuit for this key is open; short-circuited without calling
    /// the operation.
    #[error("circuit '{key}' is open, retry in {retry_after:?}")]
    CircuitOpen { key: String, retry_after: Duration },
}

// ============================================================================
// RETRY WITH EXPONENTIAL BACKOFF
// ============================================================================

/// Run `op` up to `max_retries` times total, doubling the delay between
/// attempts starting from `initial_delay`. Each retry is logged with its
/// attempt number; the final failure is returned, not swallowed.
pub async fn with_retry<T, E, F, Fut>(
    mut op: F,
    max_retries: u32,
    initial_delay: Duration,
) -> Result<T, ResilienceError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = max_retries.max(1);
    let mut delay = initial_delay;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt == attempts => {
                return Err(ResilienceError::Exhausted {
                    attempts,
                    source: err,
                });
            }
            Err(err) => {
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "operation failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    unreachable!("retry loop returns on the final attempt")
}

// ============================================================================
// TIMEOUT RACE
// ============================================================================

/// Race `op` against a timer. The operation runs as a spawned task: if the
/// timer wins, the task is detached and keeps running to completion in the
/// background. That is an accepted resource-leak risk of the design, kept
/// deliberately rather than cancelling in-flight upstream work.
pub async fn with_timeout<T, E, Fut>(
    op: Fut,
    timeout: Duration,
) -> Result<Result<T, E>, ResilienceError<E>>
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = tokio::spawn(op);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(join_err)) => {
            // The task panicked or was aborted; surface as a timeout-class
            // fault rather than propagating the panic.
            tracing::error!(error = %join_err, "wrapped operation task failed");
            Err(ResilienceError::Timeout { timeout })
        }
        Err(_elapsed) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "operation timed out; task left running");
            Err(ResilienceError::Timeout { timeout })
        }
    }
}

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

/// Breaker tuning for one logical operation key.
#[derive(Debug, Clone, Copy)]
pub struct BreakerPolicy {
    /// Consecutive failures that trip the circuit open.
    pub failure_threshold: u32,
    /// Cooldown before a trial call is let through.
    pub open_timeout: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Observable circuit transitions, for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitTransition {
    Opened,
    Closed,
    Trial,
}

impl CircuitTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitTransition::Opened => "opened",
            CircuitTransition::Closed => "closed",
            CircuitTransition::Trial => "trial",
        }
    }
}

/// One circuit per logical operation key. State machine:
/// `Closed -> (failures >= threshold) -> Open -> (cooldown elapsed) ->
/// Trial -> (success) -> Closed | (failure) -> Open`.
#[derive(Debug, Clone, Copy)]
struct CircuitState {
    failure_count: u32,
    last_failure_at: Option<Instant>,
    is_open: bool,
}

impl CircuitState {
    const CLOSED: CircuitState = CircuitState {
        failure_count: 0,
        last_failure_at: None,
        is_open: false,
    };
}

/// Read-only view of a circuit, for introspection and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub failure_count: u32,
    pub is_open: bool,
}

type TransitionObserver = Arc<dyn Fn(&str, CircuitTransition) + Send + Sync>;

/// Keyed circuit-breaker registry.
pub struct CircuitBreaker {
    states: DashMap<String, CircuitState>,
    observer: Option<TransitionObserver>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
            observer: None,
        }
    }

    /// Attach a transition observer (the gateway uses this to bump
    /// Prometheus counters).
    pub fn with_observer(
        observer: impl Fn(&str, CircuitTransition) + Send + Sync + 'static,
    ) -> Self {
        Self {
            states: DashMap::new(),
            observer: Some(Arc::new(observer)),
        }
    }

    /// Run `op` through the circuit for `key`.
    ///
    /// While open and inside the cooldown, short-circuits with
    /// [`ResilienceError::CircuitOpen`] without invoking `op`. Once the
    /// cooldown has elapsed the next call is a trial: success closes the
    /// circuit, failure reopens it with a fresh cooldown.
    pub async fn call<T, E, F, Fut>(
        &self,
        key: &str,
        policy: &BreakerPolicy,
        op: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let now = Instant::now();

        // Copy state out and drop the guard before awaiting.
        let state = self
            .states
            .get(key)
            .map(|entry| *entry.value())
            .unwrap_or(CircuitState::CLOSED);

        if state.is_open {
            let elapsed = state
                .last_failure_at
                .map(|at| now.duration_since(at))
                .unwrap_or(Duration::MAX);
            if elapsed < policy.open_timeout {
                return Err(ResilienceError::CircuitOpen {
                    key: key.to_string(),
                    retry_after: policy.open_timeout - elapsed,
                });
            }
            // Cooldown elapsed: let this call through as a trial.
            self.notify(key, CircuitTransition::Trial);
            tracing::info!(key = %key, "circuit cooldown elapsed, allowing trial call");
        }

        match op().await {
            Ok(value) => {
                let was_open = state.is_open || state.failure_count > 0;
                self.states.insert(key.to_string(), CircuitState::CLOSED);
                if was_open {
                    self.notify(key, CircuitTransition::Closed);
                    tracing::info!(key = %key, "circuit closed");
                }
                Ok(value)
            }
            Err(err) => {
                let mut entry = self
                    .states
                    .entry(key.to_string())
                    .or_insert(CircuitState::CLOSED);
                entry.failure_count = entry.failure_count.saturating_add(1);
                entry.last_failure_at = Some(Instant::now());
                let opened_now = !entry.is_open && entry.failure_count >= policy.failure_threshold;
                let reopened = state.is_open;
                if opened_now || reopened {
                    entry.is_open = true;
                }
                let failure_count = entry.failure_count;
                drop(entry);

                if opened_now || reopened {
                    self.notify(key, CircuitTransition::Opened);
                    tracing::warn!(key = %key, failure_count, error = %err, "circuit opened");
                } else {
                    tracing::warn!(key = %key, failure_count, error = %err, "circuit recorded failure");
                }

                Err(ResilienceError::Exhausted {
                    attempts: 1,
                    source: err,
                })
            }
        }
    }

    /// Current state for `key`, if any call has touched it.
    pub fn snapshot(&self, key: &str) -> Option<CircuitSnapshot> {
        self.states.get(key).map(|entry| CircuitSnapshot {
            failure_count: entry.failure_count,
            is_open: entry.is_open,
        })
    }

    fn notify(&self, key: &str, transition: CircuitTransition) {
        if let Some(observer) = &self.observer {
            observer(key, transition);
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Error)]
    #[error("upstream failed")]
    struct UpstreamError;

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = with_retry(
            || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err(UpstreamError)
                    } else {
                        Ok(attempt)
                    }
                }
            },
            3,
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(result.ok(), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Backoff before attempts 2 and 3: 100ms + 200ms.
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_final_error_when_exhausted() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError) }
            },
            3,
            Duration::from_millis(10),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(ResilienceError::Exhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_wins_race() {
        let result: Result<Result<u32, UpstreamError>, _> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(1)
            },
            Duration::from_millis(50),
        )
        .await;

        assert!(matches!(result, Err(ResilienceError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_timeout_passes_through_fast_result() {
        let result: Result<Result<u32, UpstreamError>, _> =
            with_timeout(async { Ok(7) }, Duration::from_secs(1)).await;
        assert_eq!(result.expect("no timeout").ok(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_operation_keeps_running() {
        let flag = Arc::new(AtomicU32::new(0));
        let task_flag = Arc::clone(&flag);

        let result: Result<Result<(), UpstreamError>, _> = with_timeout(
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                task_flag.store(1, Ordering::SeqCst);
                Ok(())
            },
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(ResilienceError::Timeout { .. })));

        // The losing task was detached, not cancelled.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }

    fn policy() -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: 3,
            open_timeout: Duration::from_millis(500),
        }
    }

    async fn fail(breaker: &CircuitBreaker, key: &str) {
        let _ = breaker
            .call::<(), _, _, _>(key, &policy(), || async { Err(UpstreamError) })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_after_threshold_and_short_circuits() {
        let breaker = CircuitBreaker::new();
        for _ in 0..3 {
            fail(&breaker, "op").await;
        }
        assert!(breaker.snapshot("op").expect("state").is_open);

        // Fourth call inside the cooldown must not invoke the operation.
        let invoked = AtomicU32::new(0);
        let result = breaker
            .call::<(), UpstreamError, _, _>("op", &policy(), || {
                invoked.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_trial_after_cooldown_closes_on_success() {
        let breaker = CircuitBreaker::new();
        for _ in 0..3 {
            fail(&breaker, "op").await;
        }

        tokio::time::advance(Duration::from_millis(501)).await;

        let result = breaker
            .call::<u32, UpstreamError, _, _>("op", &policy(), || async { Ok(9) })
            .await;
        assert_eq!(result.ok(), Some(9));

        let snapshot = breaker.snapshot("op").expect("state");
        assert!(!snapshot.is_open);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_trial_failure_reopens_with_fresh_cooldown() {
        let breaker = CircuitBreaker::new();
        for _ in 0..3 {
            fail(&breaker, "op").await;
        }

        tokio::time::advance(Duration::from_millis(501)).await;
        fail(&breaker, "op").await;
        assert!(breaker.snapshot("op").expect("state").is_open);

        // Still inside the fresh cooldown: short-circuit.
        let result = breaker
            .call::<(), UpstreamError, _, _>("op", &policy(), || async { Ok(()) })
            .await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_keys_are_independent() {
        let breaker = CircuitBreaker::new();
        for _ in 0..3 {
            fail(&breaker, "flaky").await;
        }

        let result = breaker
            .call::<u32, UpstreamError, _, _>("healthy", &policy(), || async { Ok(1) })
            .await;
        assert_eq!(result.ok(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_observer_sees_transitions() {
        let transitions = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&transitions);
        let breaker = CircuitBreaker::with_observer(move |key, transition| {
            if let Ok(mut seen) = sink.lock() {
                seen.push((key.to_string(), transition));
            }
        });

        for _ in 0..3 {
            fail(&breaker, "op").await;
        }
        tokio::time::advance(Duration::from_millis(501)).await;
        let _ = breaker
            .call::<(), UpstreamError, _, _>("op", &policy(), || async { Ok(()) })
            .await;

        let seen = transitions.lock().expect("observer log");
        assert_eq!(
            *seen,
            vec![
                ("op".to_string(), CircuitTransition::Opened),
                ("op".to_string(), CircuitTransition::Trial),
                ("op".to_string(), CircuitTransition::Closed),
            ]
        );
    }
}
