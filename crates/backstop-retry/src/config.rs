use crate::backoff::BackoffStrategy;
use crate::events::RetryEvent;
use backstop_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`Retry`](crate::Retry) policy.
pub struct RetryConfig {
    pub(crate) max_attempts: u32,
    pub(crate) backoff: BackoffStrategy,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

/// Builder for a [`Retry`](crate::Retry) policy.
///
/// `max_attempts` and the backoff strategy are both mandatory and taken by
/// [`Retry::builder`](crate::Retry::builder).
pub struct RetryBuilder {
    max_attempts: u32,
    backoff: BackoffStrategy,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl RetryBuilder {
    pub(crate) fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            backoff,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Gives this policy a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback before each retry, with the 1-based attempt
    /// that just failed and the delay before the next one.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback when the operation succeeds, with the total
    /// number of attempts made.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when all attempts are exhausted.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Builds the retry policy.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is zero.
    pub fn build(self) -> crate::Retry {
        assert!(self.max_attempts > 0, "max_attempts must be positive");

        crate::Retry::from_config(RetryConfig {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}
