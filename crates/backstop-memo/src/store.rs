//! Backing storage for the memoization cache.
//!
//! Two shapes behind one enum: an unbounded map for callers who manage key
//! cardinality themselves, and an LRU for callers who want a hard ceiling.
//! All mutations happen under the cache's single mutex so the LRU's
//! access-order bookkeeping stays consistent with lookups.

use hashbrown::HashMap;
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

pub(crate) enum MemoStore<K, V> {
    Unbounded(HashMap<K, V>),
    Bounded(LruCache<K, V>),
}

impl<K, V> MemoStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn unbounded() -> Self {
        MemoStore::Unbounded(HashMap::new())
    }

    pub(crate) fn bounded(capacity: NonZeroUsize) -> Self {
        MemoStore::Bounded(LruCache::new(capacity))
    }

    /// Looks up a value. On the bounded store this refreshes the key's
    /// recency, so a steadily-read entry is never the eviction victim.
    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        match self {
            MemoStore::Unbounded(map) => map.get(key).cloned(),
            MemoStore::Bounded(lru) => lru.get(key).cloned(),
        }
    }

    /// Inserts a value, returning true if a bounded store displaced its
    /// least-recently-used entry to make room.
    pub(crate) fn insert(&mut self, key: K, value: V) -> bool {
        match self {
            MemoStore::Unbounded(map) => {
                map.insert(key, value);
                false
            }
            MemoStore::Bounded(lru) => {
                // push returns the old value for the same key, or the
                // evicted LRU entry; only the latter is an eviction.
                match lru.push(key.clone(), value) {
                    Some((displaced, _)) => displaced != key,
                    None => false,
                }
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &K) -> bool {
        match self {
            MemoStore::Unbounded(map) => map.remove(key).is_some(),
            MemoStore::Bounded(lru) => lru.pop(key).is_some(),
        }
    }

    pub(crate) fn clear(&mut self) {
        match self {
            MemoStore::Unbounded(map) => map.clear(),
            MemoStore::Bounded(lru) => lru.clear(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            MemoStore::Unbounded(map) => map.len(),
            MemoStore::Bounded(lru) => lru.len(),
        }
    }
}
