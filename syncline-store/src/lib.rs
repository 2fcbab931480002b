//! Syncline Store - In-Process State
//!
//! The three keyed stores the gateway composes: a TTL/size-bounded cache,
//! fixed-window rate-limit counters, and the resilience executor (retry,
//! timeout, circuit breaker). All state lives in process-local concurrent
//! maps; every store keeps a trait seam so a shared external backend can
//! replace the in-memory one without touching callers.

pub mod cache;
pub mod rate_limit;
pub mod resilience;

pub use cache::CacheStore;
pub use rate_limit::{
    BackendError, CounterBackend, InMemoryCounters, RateLimitConfig, RateLimitDecision,
    RateLimitStore,
};
pub use resilience::{
    with_retry, with_timeout, BreakerPolicy, CircuitBreaker, CircuitSnapshot, CircuitTransition,
    ResilienceError,
};
