use crate::error::IdempotencyError;
use crate::events::IdempotencyEvent;
use backstop_core::{EventListeners, FnListener, MonotonicClock, Scheduler, SharedClock};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for an [`IdempotencyCache`](crate::IdempotencyCache).
pub struct IdempotencyConfig {
    pub(crate) ttl: Duration,
    pub(crate) clock: SharedClock,
    pub(crate) scheduler: Scheduler,
    pub(crate) event_listeners: EventListeners<IdempotencyEvent>,
    pub(crate) name: String,
}

impl IdempotencyConfig {
    /// Sweep interval derived from the TTL: a fifth of the TTL, capped at
    /// one minute, floored at 10ms so tiny TTLs cannot spin the sweep task.
    pub(crate) fn sweep_interval(&self) -> Duration {
        (self.ttl / 5)
            .min(Duration::from_secs(60))
            .max(Duration::from_millis(10))
    }
}

/// Builder for an [`IdempotencyCache`](crate::IdempotencyCache).
///
/// The TTL is mandatory and taken by
/// [`IdempotencyCache::builder`](crate::IdempotencyCache::builder).
pub struct IdempotencyBuilder<K, T, E> {
    ttl: Duration,
    clock: SharedClock,
    scheduler: Scheduler,
    event_listeners: EventListeners<IdempotencyEvent>,
    name: String,
    _marker: PhantomData<fn() -> (K, T, E)>,
}

impl<K, T, E> IdempotencyBuilder<K, T, E>
where
    K: Hash + Eq + Clone + Send + 'static,
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            clock: Arc::new(MonotonicClock),
            scheduler: Scheduler::default(),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
            _marker: PhantomData,
        }
    }

    /// Gives this cache a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the clock used for expiry decisions. Intended for tests.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the scheduler driving the background sweep.
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Registers a callback for every cache hit.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let IdempotencyEvent::CacheHit { .. } = event {
                f();
            }
        }));
        self
    }

    /// Registers a callback for every call that attached to an in-flight
    /// execution instead of running its own.
    pub fn on_coalesced<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let IdempotencyEvent::Coalesced { .. } = event {
                f();
            }
        }));
        self
    }

    /// Registers a callback after each background sweep, with the number of
    /// expired slots removed.
    pub fn on_sweep<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let IdempotencyEvent::SweepCompleted { removed, .. } = event {
                f(*removed);
            }
        }));
        self
    }

    /// Builds the cache and starts its background sweep task.
    ///
    /// Must be called within a Tokio runtime; the sweep is a spawned task.
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::InvalidTtl`] if the TTL is zero.
    pub fn build(self) -> Result<crate::IdempotencyCache<K, T, E>, IdempotencyError> {
        if self.ttl.is_zero() {
            return Err(IdempotencyError::InvalidTtl(self.ttl));
        }

        Ok(crate::IdempotencyCache::from_config(IdempotencyConfig {
            ttl: self.ttl,
            clock: self.clock,
            scheduler: self.scheduler,
            event_listeners: self.event_listeners,
            name: self.name,
        }))
    }
}
