//! Success-only memoization with optional LRU bounds.
//!
//! [`MemoCache`] remembers the successful results of an async computation by
//! key. A hit returns the cached value without invoking anything; a miss
//! runs the computation and caches the value only if it succeeds, so a
//! transient failure never poisons the cache. Bounded caches evict their
//! least-recently-used entry when full.
//!
//! Unlike an idempotency cache there is no coalescing and no TTL: entries
//! live until invalidated or evicted, and concurrent misses for the same key
//! each run the computation.
//!
//! # Examples
//!
//! ```
//! use backstop_memo::MemoCache;
//!
//! # async fn fetch_user_count(region: &str) -> Result<u64, String> { Ok(7) }
//! # async fn example() -> Result<(), String> {
//! let cache: MemoCache<String, u64> = MemoCache::bounded(10_000).unwrap();
//!
//! let count = cache
//!     .get("eu-west".to_string(), || fetch_user_count("eu-west"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod store;

pub use config::{MemoBuilder, MemoConfig};
pub use error::MemoError;
pub use events::MemoEvent;

use parking_lot::Mutex;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use store::MemoStore;

#[cfg(feature = "metrics")]
use metrics::counter;

/// A keyed cache over an async computation's successful results.
///
/// Cloning is cheap and shares the underlying store and counters.
pub struct MemoCache<K, V>
where
    K: Hash + Eq,
{
    config: Arc<MemoConfig>,
    store: Arc<Mutex<MemoStore<K, V>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<K, V> Clone for MemoCache<K, V>
where
    K: Hash + Eq,
{
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a builder for a cache with hooks or a size bound.
    pub fn builder() -> MemoBuilder<K, V> {
        MemoBuilder::new()
    }

    /// Creates an unbounded cache with default configuration.
    pub fn unbounded() -> Self {
        Self::from_config(
            MemoConfig {
                event_listeners: backstop_core::EventListeners::new(),
                name: String::from("<unnamed>"),
            },
            None,
        )
    }

    /// Creates a cache bounded to `max_size` entries with LRU eviction.
    ///
    /// # Errors
    ///
    /// Returns [`MemoError::InvalidCapacity`] if `max_size` is zero.
    pub fn bounded(max_size: usize) -> Result<Self, MemoError> {
        Self::builder().max_size(max_size).build()
    }

    pub(crate) fn from_config(config: MemoConfig, capacity: Option<NonZeroUsize>) -> Self {
        let store = match capacity {
            Some(capacity) => MemoStore::bounded(capacity),
            None => MemoStore::unbounded(),
        };

        Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(store)),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the cached value for `key`, or runs `compute` and caches its
    /// result on success.
    ///
    /// A failed computation is propagated unchanged and nothing is cached,
    /// so the next `get` for the key computes again. On a bounded cache a
    /// hit refreshes the key's recency.
    pub async fn get<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // Bind the lookup so the store guard is released before the counter
        // update and listener callbacks run.
        let cached = self.store.lock().get(&key);
        if let Some(value) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.emit(MemoEvent::Hit {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
            });

            #[cfg(feature = "metrics")]
            counter!("memo_lookups_total", "memo" => self.config.name.clone(), "outcome" => "hit")
                .increment(1);

            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.emit(MemoEvent::Miss {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        counter!("memo_lookups_total", "memo" => self.config.name.clone(), "outcome" => "miss")
            .increment(1);

        let value = compute().await?;

        let evicted = self.store.lock().insert(key, value.clone());
        if evicted {
            self.emit(MemoEvent::Eviction {
                pattern_name: self.config.name.clone(),
                timestamp: Instant::now(),
            });

            #[cfg(feature = "tracing")]
            tracing::trace!(memo = %self.config.name, "evicted least-recently-used entry");

            #[cfg(feature = "metrics")]
            counter!("memo_evictions_total", "memo" => self.config.name.clone()).increment(1);
        }

        Ok(value)
    }

    /// Removes a key's cached value, if any. Returns true if an entry was
    /// removed.
    pub fn invalidate(&self, key: &K) -> bool {
        self.store.lock().remove(key)
    }

    /// Removes every cached value. Counters are left untouched.
    pub fn invalidate_all(&self) {
        self.store.lock().clear();
    }

    /// Number of lookups served from the cache.
    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that invoked the computation.
    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit(&self, event: MemoEvent) {
        self.config.event_listeners.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn second_lookup_is_a_hit() {
        let cache: MemoCache<String, u64> = MemoCache::unbounded();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let c = Arc::clone(&calls);
            let value = cache
                .get("answer".to_string(), || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hit_count(), 2);
        assert_eq!(cache.miss_count(), 1);
    }

    #[tokio::test]
    async fn failures_are_never_cached() {
        let cache: MemoCache<String, u64> = MemoCache::unbounded();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        let result = cache
            .get("key".to_string(), || async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u64, _>("boom".to_string())
            })
            .await;
        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(cache.len(), 0);

        let c = Arc::clone(&calls);
        let value = cache
            .get("key".to_string(), || async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(1)
            })
            .await
            .unwrap();
        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn hits_plus_misses_equal_total_lookups() {
        let cache: MemoCache<u32, u32> = MemoCache::unbounded();

        for i in 0..10u32 {
            // Two lookups per key: one miss, one hit.
            for _ in 0..2 {
                cache
                    .get(i, || async move { Ok::<_, String>(i * 2) })
                    .await
                    .unwrap();
            }
        }

        assert_eq!(cache.hit_count() + cache.miss_count(), 20);
        assert_eq!(cache.hit_count(), 10);
        assert_eq!(cache.miss_count(), 10);
    }

    #[tokio::test]
    async fn bounded_cache_evicts_least_recently_accessed() {
        let evictions = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&evictions);
        let cache: MemoCache<&str, u32> = MemoCache::builder()
            .max_size(2)
            .on_eviction(move || {
                e.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        cache.get("a", || async { Ok::<_, String>(1) }).await.unwrap();
        cache.get("b", || async { Ok::<_, String>(2) }).await.unwrap();

        // Touch "a" so "b" is the LRU victim.
        cache.get("a", || async { Ok::<_, String>(0) }).await.unwrap();

        cache.get("c", || async { Ok::<_, String>(3) }).await.unwrap();
        assert_eq!(evictions.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 2);

        // "b" recomputes; "a" is still cached.
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        cache
            .get("b", || async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(2)
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let c = Arc::clone(&calls);
        assert_eq!(
            cache
                .get("a", || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(9)
                })
                .await
                .unwrap(),
            1
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hit_hook_may_reenter_the_cache() {
        let observed_len = Arc::new(AtomicUsize::new(usize::MAX));
        let slot: Arc<std::sync::OnceLock<MemoCache<&str, u32>>> =
            Arc::new(std::sync::OnceLock::new());

        // The hook calls back into the cache, so the store mutex must not
        // still be held when listeners run.
        let s = Arc::clone(&slot);
        let l = Arc::clone(&observed_len);
        let cache: MemoCache<&str, u32> = MemoCache::builder()
            .on_hit(move || {
                if let Some(cache) = s.get() {
                    l.store(cache.len(), Ordering::SeqCst);
                }
            })
            .build()
            .unwrap();
        assert!(slot.set(cache.clone()).is_ok());

        cache.get("k", || async { Ok::<_, String>(1) }).await.unwrap();
        cache.get("k", || async { Ok::<_, String>(1) }).await.unwrap();

        assert_eq!(cache.hit_count(), 1);
        assert_eq!(observed_len.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let cache: MemoCache<String, u32> = MemoCache::unbounded();
        let calls = Arc::new(AtomicUsize::new(0));

        let lookup = |cache: MemoCache<String, u32>, c: Arc<AtomicUsize>| async move {
            cache
                .get("key".to_string(), || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(5)
                })
                .await
                .unwrap()
        };

        lookup(cache.clone(), Arc::clone(&calls)).await;
        lookup(cache.clone(), Arc::clone(&calls)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(cache.invalidate(&"key".to_string()));
        assert!(!cache.invalidate(&"key".to_string()));

        lookup(cache.clone(), Arc::clone(&calls)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_all_clears_entries_but_not_counters() {
        let cache: MemoCache<u32, u32> = MemoCache::unbounded();

        for i in 0..5u32 {
            cache.get(i, || async move { Ok::<_, String>(i) }).await.unwrap();
        }
        assert_eq!(cache.len(), 5);

        cache.invalidate_all();
        assert!(cache.is_empty());
        assert_eq!(cache.miss_count(), 5);
    }

    #[tokio::test]
    async fn hooks_fire_for_hit_and_miss() {
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let m = Arc::clone(&misses);

        let cache: MemoCache<&str, u32> = MemoCache::builder()
            .name("hooked")
            .on_hit(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .on_miss(move || {
                m.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        cache.get("k", || async { Ok::<_, String>(1) }).await.unwrap();
        cache.get("k", || async { Ok::<_, String>(1) }).await.unwrap();

        assert_eq!(misses.load(Ordering::SeqCst), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
