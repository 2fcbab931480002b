//! Fixed-window rate limiting
//!
//! One counter per admission key per active window. The counter backend is
//! a trait so the in-memory map can be swapped for a shared external KV;
//! an external backend must provide an atomic increment, otherwise the
//! read-modify-write race the single-instance design tolerates becomes a
//! correctness bug.
//!
//! Failure policy: a backend fault **fails open** - the request is allowed
//! and the fault is logged at warn. Strict enforcement is traded for
//! availability, never silently.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;

// ============================================================================
// CONFIG & DECISION
// ============================================================================

/// Admission policy for one class of callers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 100,
        }
    }
}

/// Outcome of an admission check. Returned as a value, not raised - the
/// caller decides how to surface a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// When the current window lapses and the counter resets.
    pub reset_at: DateTime<Utc>,
    /// Whole seconds until `reset_at`, present only on denial.
    pub retry_after_secs: Option<u64>,
}

// ============================================================================
// COUNTER BACKEND
// ============================================================================

/// Backend fault. The in-memory backend is infallible; a networked KV is
/// not, and its faults trigger the fail-open path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("counter backend unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Counter state after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

/// Storage seam for window counters.
pub trait CounterBackend: Send + Sync {
    /// Atomically increment the counter for `key`, starting a fresh window
    /// (count = 1) if none exists or the previous one lapsed.
    fn increment(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<WindowCount, BackendError>;

    /// Administrative override: drop the record for `key`.
    fn reset(&self, key: &str) -> Result<(), BackendError>;
}

/// One record per admission key per active window.
#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    window_reset_at: DateTime<Utc>,
}

/// Process-local counter backend. Per-key atomicity comes from the map's
/// entry API, which serializes the read-modify-write.
#[derive(Default)]
pub struct InMemoryCounters {
    records: DashMap<String, RateLimitRecord>,
}

impl InMemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterBackend for InMemoryCounters {
    fn increment(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<WindowCount, BackendError> {
        use dashmap::mapref::entry::Entry;

        let fresh = RateLimitRecord {
            count: 1,
            window_reset_at: now
                + chrono::Duration::from_std(window).unwrap_or(chrono::Duration::seconds(60)),
        };

        let record = match self.records.entry(key.to_string()) {
            Entry::Vacant(vacant) => *vacant.insert(fresh),
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if now >= record.window_reset_at {
                    // Window lapsed: behave as if no record existed.
                    *record = fresh;
                } else {
                    record.count = record.count.saturating_add(1);
                }
                *record
            }
        };

        Ok(WindowCount {
            count: record.count,
            reset_at: record.window_reset_at,
        })
    }

    fn reset(&self, key: &str) -> Result<(), BackendError> {
        self.records.remove(key);
        Ok(())
    }
}

// ============================================================================
// RATE LIMIT STORE
// ============================================================================

/// Admission control over a counter backend.
pub struct RateLimitStore<B: CounterBackend = InMemoryCounters> {
    backend: B,
}

impl RateLimitStore<InMemoryCounters> {
    pub fn new() -> Self {
        Self {
            backend: InMemoryCounters::new(),
        }
    }
}

impl Default for RateLimitStore<InMemoryCounters> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CounterBackend> RateLimitStore<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Check and record one request for `key`.
    pub fn check_limit(&self, key: &str, config: &RateLimitConfig) -> RateLimitDecision {
        self.check_limit_at(key, config, Utc::now())
    }

    /// Deterministic variant taking an explicit clock, used by tests and
    /// by callers that already hold a request timestamp.
    pub fn check_limit_at(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let counted = match self.backend.increment(key, config.window, now) {
            Ok(counted) => counted,
            Err(err) => {
                // Fail open: availability over strict enforcement.
                tracing::warn!(key = %key, error = %err, "rate limit backend error; failing open");
                return RateLimitDecision {
                    allowed: true,
                    remaining: config.max_requests,
                    reset_at: now
                        + chrono::Duration::from_std(config.window)
                            .unwrap_or(chrono::Duration::seconds(60)),
                    retry_after_secs: None,
                };
            }
        };

        let allowed = counted.count <= config.max_requests;
        let remaining = config.max_requests.saturating_sub(counted.count);

        let retry_after_secs = if allowed {
            None
        } else {
            let millis = (counted.reset_at - now).num_milliseconds().max(0) as u64;
            Some(millis.div_ceil(1000).max(1))
        };

        RateLimitDecision {
            allowed,
            remaining,
            reset_at: counted.reset_at,
            retry_after_secs,
        }
    }

    /// Administrative override: clear the record for `key`.
    pub fn reset_limit(&self, key: &str) {
        if let Err(err) = self.backend.reset(key) {
            tracing::warn!(key = %key, error = %err, "rate limit reset failed");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
