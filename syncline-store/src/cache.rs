//! TTL key/value cache with capacity-bounded eviction
//!
//! Cache-aside store used by the gateway for entity responses. Expired
//! entries are invisible to readers and removed lazily on access; a
//! background sweeper purges them independently of the request path so an
//! idle key cannot pin memory forever.
//!
//! Eviction under capacity pressure removes the oldest-*inserted* key.
//! That is an approximation of LRU (recency is not updated on reads), kept
//! deliberately simple; see the module tests for the exact guarantee.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// A single cache slot. `expires_at = None` means no expiry.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Generic TTL cache bounded to `max_entries`.
///
/// `get_or_set` is **not** single-flight: concurrent misses on the same key
/// each invoke the factory and converge on whichever result lands last.
/// Acceptable while factories are idempotent reads; otherwise it duplicates
/// upstream work.
pub struct CacheStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
    /// Keys in insertion order, used to pick eviction candidates. May hold
    /// stale keys after deletes; they are skipped during eviction.
    insertion_order: Mutex<VecDeque<String>>,
    max_entries: usize,
}

impl<V: Clone + Send + Sync + 'static> CacheStore<V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Look up a live value. Expired entries are deleted on sight.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // Lazy expiry: drop the read guard before removing.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// Insert a value. `ttl = 0` means no expiry (lives until deleted or
    /// evicted). Inserting a new key at capacity evicts the oldest-inserted
    /// existing key first.
    ///
    /// The insertion-order lock is held across the new-key check, eviction,
    /// and queue push: a key must never end up queued twice, or a later
    /// re-insert of it gets evicted out of turn by the stale occurrence.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };

        let Ok(mut order) = self.insertion_order.lock() else {
            // Queue poisoned: keep serving values, give up order tracking.
            self.entries.insert(key, CacheEntry { value, expires_at });
            return;
        };

        let is_new = !self.entries.contains_key(&key);
        if is_new && self.entries.len() >= self.max_entries {
            self.evict_oldest(&mut order);
        }

        self.entries.insert(key.clone(), CacheEntry { value, expires_at });
        if is_new {
            order.push_back(key);
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false)
    }

    /// Keys of live entries, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache-aside combinator: return the cached value, or run `factory`,
    /// store its result under `key` with `ttl`, and return it. Factory
    /// errors are propagated without touching the cache.
    pub async fn get_or_set<E, F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl: Duration,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            tracing::debug!(key = %key, "cache hit");
            return Ok(value);
        }

        tracing::debug!(key = %key, "cache miss");
        let value = factory().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove every expired entry and prune dead keys from the insertion
    /// queue. Called by the background sweeper; safe to call at any time.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        if let Ok(mut order) = self.insertion_order.lock() {
            order.retain(|key| self.entries.contains_key(key));
        }
        before - self.entries.len()
    }

    /// Spawn the periodic sweep task. The task runs for the life of the
    /// process; dropping the handle detaches it.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "cache sweep removed expired entries");
                }
            }
        })
    }

    fn evict_oldest(&self, order: &mut VecDeque<String>) {
        // Skip keys already deleted out from under the queue.
        while let Some(candidate) = order.pop_front() {
            if self.entries.remove(&candidate).is_some() {
                tracing::debug!(key = %candidate, "evicted oldest-inserted cache entry");
                return;
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get_returns_value() {
        let cache: CacheStore<String> = CacheStore::new(16);
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert!(cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache: CacheStore<String> = CacheStore::new(16);
        cache.set("k", "v".to_string(), Duration::from_millis(50));
        assert_eq!(cache.get("k"), Some("v".to_string()));

        tokio::time::advance(Duration::from_millis(51)).await;
        assert_eq!(cache.get("k"), None);
        assert!(!cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_never_expires() {
        let cache: CacheStore<u32> = CacheStore::new(16);
        cache.set("k", 7, Duration::ZERO);

        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert_eq!(cache.get("k"), Some(7));
    }

    #[tokio::test]
    async fn test_capacity_never_exceeded() {
        let cache: CacheStore<u32> = CacheStore::new(3);
        for i in 0..10 {
            cache.set(format!("k{}", i), i, Duration::ZERO);
            assert!(cache.len() <= 3);
        }
    }

    #[tokio::test]
    async fn test_eviction_removes_oldest_inserted() {
        let cache: CacheStore<u32> = CacheStore::new(2);
        cache.set("first", 1, Duration::ZERO);
        cache.set("second", 2, Duration::ZERO);
        // Reading "first" does not refresh it; insertion order decides.
        assert_eq!(cache.get("first"), Some(1));

        cache.set("third", 3, Duration::ZERO);
        assert_eq!(cache.get("first"), None);
        assert_eq!(cache.get("second"), Some(2));
        assert_eq!(cache.get("third"), Some(3));
    }

    #[tokio::test]
    async fn test_overwrite_existing_key_does_not_evict() {
        let cache: CacheStore<u32> = CacheStore::new(2);
        cache.set("a", 1, Duration::ZERO);
        cache.set("b", 2, Duration::ZERO);
        cache.set("a", 10, Duration::ZERO);

        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_keys() {
        let cache: CacheStore<u32> = CacheStore::new(8);
        cache.set("a", 1, Duration::ZERO);
        cache.set("b", 2, Duration::ZERO);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));

        let keys = cache.keys();
        assert_eq!(keys, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_get_or_set_invokes_factory_on_miss_only() {
        let cache: CacheStore<u32> = CacheStore::new(8);

        let value: Result<u32, &str> = cache
            .get_or_set("k", || async { Ok(41) }, Duration::from_secs(60))
            .await;
        assert_eq!(value, Ok(41));

        // Second call must hit the cache, not the factory.
        let value: Result<u32, &str> = cache
            .get_or_set("k", || async { Err("factory reran") }, Duration::from_secs(60))
            .await;
        assert_eq!(value, Ok(41));
    }

    #[tokio::test]
    async fn test_get_or_set_propagates_factory_error() {
        let cache: CacheStore<u32> = CacheStore::new(8);
        let value: Result<u32, &str> = cache
            .get_or_set("k", || async { Err("upstream down") }, Duration::from_secs(60))
            .await;
        assert_eq!(value, Err("upstream down"));
        assert!(!cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_removes_only_expired() {
        let cache: CacheStore<u32> = CacheStore::new(8);
        cache.set("short", 1, Duration::from_millis(10));
        cache.set("long", 2, Duration::from_secs(60));
        cache.set("forever", 3, Duration::ZERO);

        tokio::time::advance(Duration::from_millis(20)).await;
        let purged = cache.purge_expired();

        assert_eq!(purged, 1);
        assert_eq!(cache.len(), 2);
        assert!(cache.has("long"));
        assert!(cache.has("forever"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_inserts_of_same_key_queue_it_once() {
        let cache: Arc<CacheStore<u32>> = Arc::new(CacheStore::new(3));

        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.set("hot", i, Duration::ZERO);
            }));
        }
        for handle in handles {
            handle.await.expect("insert task");
        }

        // Fill to capacity, push "hot" out as the oldest, then bring it back.
        cache.set("a", 1, Duration::ZERO);
        cache.set("b", 2, Duration::ZERO);
        cache.set("c", 3, Duration::ZERO);
        assert_eq!(cache.get("hot"), None);
        cache.set("hot", 99, Duration::ZERO);

        // "hot" is now the newest entry. A stale duplicate of it left in the
        // queue by the racing inserts would evict it out of turn here.
        cache.set("d", 4, Duration::ZERO);
        assert_eq!(cache.get("hot"), Some(99));
        assert!(cache.len() <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_in_background() {
        let cache: Arc<CacheStore<u32>> = Arc::new(CacheStore::new(8));
        cache.set("k", 1, Duration::from_millis(10));

        let handle = cache.spawn_sweeper(Duration::from_millis(50));
        tokio::time::advance(Duration::from_millis(120)).await;
        // Let the sweeper task run its tick.
        tokio::task::yield_now().await;

        assert_eq!(cache.len(), 0);
        handle.abort();
    }
}
