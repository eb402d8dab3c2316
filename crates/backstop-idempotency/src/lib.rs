//! TTL-bounded idempotency cache with in-flight coalescing.
//!
//! [`IdempotencyCache`] gives each key at-most-once execution within a TTL
//! window: the first call for a key runs the operation, concurrent calls for
//! the same key attach to that execution and share its result, and later
//! calls within the TTL get the cached value without running anything.
//! Failures are never cached — the error is shared with the calls already
//! attached, then discarded, so the next call retries.
//!
//! A background sweep removes expired entries. The sweep task's lifecycle is
//! explicit: [`IdempotencyCache::close`] stops it, and dropping the last
//! handle to the cache stops it too.
//!
//! # Examples
//!
//! ```no_run
//! use backstop_idempotency::IdempotencyCache;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache: IdempotencyCache<String, u64, String> =
//!     IdempotencyCache::builder(Duration::from_secs(30))
//!         .name("create-order")
//!         .build()?;
//!
//! let order_id = cache
//!     .execute("request-abc123".to_string(), || async {
//!         // charge the card, create the order...
//!         Ok::<_, String>(42)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;

pub use config::{IdempotencyBuilder, IdempotencyConfig};
pub use error::IdempotencyError;
pub use events::IdempotencyEvent;

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

#[cfg(feature = "metrics")]
use metrics::counter;

/// One key's entry: either an execution in progress or a cached success.
enum Slot<T, E> {
    /// The creator is running; waiters subscribe to the sender.
    InFlight(broadcast::Sender<Result<T, E>>),
    /// A successful result, valid until `expires_at`.
    Resolved { value: T, expires_at: Instant },
}

/// What a call turned out to be after the create-or-fetch step.
enum Role<T, E> {
    Creator,
    Waiter(broadcast::Receiver<Result<T, E>>),
    Cached(T),
}

/// Removes the creator's in-flight slot if its future is dropped before
/// completing, so waiters see a closed channel and can take over.
struct CreatorGuard<'a, K, T, E>
where
    K: Hash + Eq,
{
    store: &'a Mutex<HashMap<K, Slot<T, E>>>,
    key: Option<K>,
}

impl<K, T, E> Drop for CreatorGuard<'_, K, T, E>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.store.lock().remove(&key);
        }
    }
}

/// Shares the background sweep task between cache clones and cancels it when
/// the last clone is dropped.
struct SweepTask {
    handle: Mutex<Option<backstop_core::TaskHandle>>,
}

impl SweepTask {
    fn cancel(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.cancel();
        }
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.cancel();
        }
    }
}

/// An at-most-once-per-key execution cache.
///
/// Cloning is cheap and shares the underlying store, so one cache can be
/// handed to many tasks.
pub struct IdempotencyCache<K, T, E>
where
    K: Hash + Eq,
{
    config: Arc<IdempotencyConfig>,
    store: Arc<Mutex<HashMap<K, Slot<T, E>>>>,
    sweep: Arc<SweepTask>,
}

impl<K, T, E> Clone for IdempotencyCache<K, T, E>
where
    K: Hash + Eq,
{
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            sweep: Arc::clone(&self.sweep),
        }
    }
}

impl<K, T, E> IdempotencyCache<K, T, E>
where
    K: Hash + Eq + Clone + Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a builder. The TTL is mandatory: it bounds how long a
    /// successful result answers for its key.
    pub fn builder(ttl: std::time::Duration) -> IdempotencyBuilder<K, T, E> {
        IdempotencyBuilder::new(ttl)
    }

    pub(crate) fn from_config(config: IdempotencyConfig) -> Self {
        let config = Arc::new(config);
        let store: Arc<Mutex<HashMap<K, Slot<T, E>>>> = Arc::new(Mutex::new(HashMap::new()));

        // The sweep captures a weak store reference so it never keeps the
        // cache alive on its own; cancellation is handled by SweepTask.
        let store_weak = Arc::downgrade(&store);
        let sweep_config = Arc::clone(&config);
        let handle = config
            .scheduler
            .schedule_at_fixed_rate(config.sweep_interval(), move || {
                let Some(store) = store_weak.upgrade() else {
                    return;
                };
                let now = sweep_config.clock.now();
                let removed = {
                    let mut slots = store.lock();
                    let before = slots.len();
                    slots.retain(|_, slot| match slot {
                        Slot::InFlight(_) => true,
                        Slot::Resolved { expires_at, .. } => *expires_at > now,
                    });
                    before - slots.len()
                };

                sweep_config
                    .event_listeners
                    .emit(&IdempotencyEvent::SweepCompleted {
                        pattern_name: sweep_config.name.clone(),
                        timestamp: Instant::now(),
                        removed,
                    });

                #[cfg(feature = "tracing")]
                if removed > 0 {
                    tracing::debug!(
                        idempotency = %sweep_config.name,
                        removed,
                        "sweep removed expired entries"
                    );
                }

                #[cfg(feature = "metrics")]
                counter!("idempotency_sweep_removed_total", "idempotency" => sweep_config.name.clone())
                    .increment(removed as u64);
            });

        Self {
            config,
            store,
            sweep: Arc::new(SweepTask {
                handle: Mutex::new(Some(handle)),
            }),
        }
    }

    /// Runs `op` at most once per key within the TTL window.
    ///
    /// The first call for a key becomes the creator and invokes `op`.
    /// Concurrent calls for the same key await the creator's result and
    /// receive a clone. Calls arriving within the TTL of a cached success
    /// return it without invoking anything. A failed execution is propagated
    /// to the creator and all attached waiters, and nothing is cached.
    ///
    /// If the creator's future is dropped mid-flight, its slot is removed
    /// and one of the released waiters takes over as creator, invoking its
    /// own `op`. Each call's thunk runs at most once.
    pub async fn execute<F, Fut>(&self, key: K, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut op = Some(op);

        loop {
            let role = {
                let now = self.config.clock.now();
                let mut slots = self.store.lock();
                match slots.get(&key) {
                    Some(Slot::InFlight(tx)) => Role::Waiter(tx.subscribe()),
                    Some(Slot::Resolved { value, expires_at }) if *expires_at > now => {
                        Role::Cached(value.clone())
                    }
                    // No entry, or a resolved entry past its TTL.
                    _ => {
                        let (tx, _rx) = broadcast::channel(1);
                        slots.insert(key.clone(), Slot::InFlight(tx));
                        Role::Creator
                    }
                }
            };

            match role {
                Role::Cached(value) => {
                    self.emit_simple(IdempotencyEvent::CacheHit {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                    });

                    #[cfg(feature = "metrics")]
                    counter!("idempotency_calls_total", "idempotency" => self.config.name.clone(), "outcome" => "hit")
                        .increment(1);

                    return Ok(value);
                }
                Role::Waiter(mut rx) => {
                    self.emit_simple(IdempotencyEvent::Coalesced {
                        pattern_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                    });

                    #[cfg(feature = "metrics")]
                    counter!("idempotency_calls_total", "idempotency" => self.config.name.clone(), "outcome" => "coalesced")
                        .increment(1);

                    match rx.recv().await {
                        Ok(result) => return result,
                        // Creator dropped without resolving; go around and
                        // possibly become the new creator.
                        Err(_) => continue,
                    }
                }
                Role::Creator => {
                    let Some(thunk) = op.take() else {
                        // A call consumes its thunk only on the creator
                        // path, and the creator path always returns.
                        unreachable!("idempotency thunk consumed twice");
                    };

                    let mut guard = CreatorGuard {
                        store: &self.store,
                        key: Some(key),
                    };

                    let result = thunk().await;

                    // Disarm the guard; from here completion is handled
                    // explicitly.
                    let Some(key) = guard.key.take() else {
                        unreachable!("creator guard disarmed twice");
                    };

                    match &result {
                        Ok(value) => {
                            let expires_at = self.config.clock.now() + self.config.ttl;
                            let previous = self.store.lock().insert(
                                key,
                                Slot::Resolved {
                                    value: value.clone(),
                                    expires_at,
                                },
                            );
                            if let Some(Slot::InFlight(tx)) = previous {
                                let _ = tx.send(Ok(value.clone()));
                            }

                            self.emit_simple(IdempotencyEvent::Executed {
                                pattern_name: self.config.name.clone(),
                                timestamp: Instant::now(),
                            });

                            #[cfg(feature = "metrics")]
                            counter!("idempotency_calls_total", "idempotency" => self.config.name.clone(), "outcome" => "executed")
                                .increment(1);
                        }
                        Err(error) => {
                            if let Some(Slot::InFlight(tx)) = self.store.lock().remove(&key) {
                                let _ = tx.send(Err(error.clone()));
                            }

                            self.emit_simple(IdempotencyEvent::FailureDiscarded {
                                pattern_name: self.config.name.clone(),
                                timestamp: Instant::now(),
                            });

                            #[cfg(feature = "tracing")]
                            tracing::debug!(
                                idempotency = %self.config.name,
                                "execution failed; result not cached"
                            );

                            #[cfg(feature = "metrics")]
                            counter!("idempotency_calls_total", "idempotency" => self.config.name.clone(), "outcome" => "failed")
                                .increment(1);
                        }
                    }

                    return result;
                }
            }
        }
    }

    /// Removes a key's cached result, if any. In-flight executions are left
    /// alone.
    pub fn invalidate(&self, key: &K) {
        let mut slots = self.store.lock();
        if matches!(slots.get(key), Some(Slot::Resolved { .. })) {
            slots.remove(key);
        }
    }

    /// Number of slots currently held, in-flight and resolved.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Returns true if no slots are held.
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Stops the background sweep task. Idempotent; the cache itself keeps
    /// working, but expired entries are then only replaced lazily on access.
    pub fn close(&self) {
        self.sweep.cancel();
    }

    fn emit_simple(&self, event: IdempotencyEvent) {
        self.config.event_listeners.emit(&event);
    }
}
