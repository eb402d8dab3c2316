use crate::error::MemoError;
use crate::events::MemoEvent;
use backstop_core::{EventListeners, FnListener};
use std::hash::Hash;
use std::marker::PhantomData;
use std::num::NonZeroUsize;

/// Configuration for a [`MemoCache`](crate::MemoCache).
pub struct MemoConfig {
    pub(crate) event_listeners: EventListeners<MemoEvent>,
    pub(crate) name: String,
}

/// Builder for a [`MemoCache`](crate::MemoCache).
pub struct MemoBuilder<K, V> {
    max_size: Option<usize>,
    event_listeners: EventListeners<MemoEvent>,
    name: String,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> MemoBuilder<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            max_size: None,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
            _marker: PhantomData,
        }
    }

    /// Bounds the cache to `max_size` entries with LRU eviction.
    ///
    /// Default: unbounded.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Gives this cache a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for every cache hit.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let MemoEvent::Hit { .. } = event {
                f();
            }
        }));
        self
    }

    /// Registers a callback for every cache miss.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let MemoEvent::Miss { .. } = event {
                f();
            }
        }));
        self
    }

    /// Registers a callback for every LRU eviction.
    pub fn on_eviction<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let MemoEvent::Eviction { .. } = event {
                f();
            }
        }));
        self
    }

    /// Builds the cache.
    ///
    /// # Errors
    ///
    /// Returns [`MemoError::InvalidCapacity`] if `max_size` was set to zero.
    pub fn build(self) -> Result<crate::MemoCache<K, V>, MemoError> {
        let capacity = match self.max_size {
            Some(n) => {
                Some(NonZeroUsize::new(n).ok_or(MemoError::InvalidCapacity(n))?)
            }
            None => None,
        };

        Ok(crate::MemoCache::from_config(
            MemoConfig {
                event_listeners: self.event_listeners,
                name: self.name,
            },
            capacity,
        ))
    }
}
