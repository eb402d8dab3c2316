use crate::events::RateLimiterEvent;
use backstop_core::{EventListeners, FnListener, MonotonicClock, SharedClock};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`RateLimiter`](crate::RateLimiter).
pub struct RateLimiterConfig {
    pub(crate) rate: u64,
    pub(crate) period: Duration,
    pub(crate) burst: u64,
    pub(crate) max_wait: Option<Duration>,
    pub(crate) clock: SharedClock,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

/// Builder for a [`RateLimiter`](crate::RateLimiter).
///
/// `rate` and `period` are required and taken by
/// [`RateLimiter::builder`](crate::RateLimiter::builder); everything else has
/// an explicit default.
pub struct RateLimiterBuilder {
    rate: u64,
    period: Duration,
    burst: u64,
    max_wait: Option<Duration>,
    clock: SharedClock,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl RateLimiterBuilder {
    pub(crate) fn new(rate: u64, period: Duration) -> Self {
        Self {
            rate,
            period,
            burst: 0,
            max_wait: None,
            clock: Arc::new(MonotonicClock),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Extra tokens above `rate` the bucket can hold; capacity is
    /// `rate + burst`.
    ///
    /// Default: 0
    pub fn burst(mut self, burst: u64) -> Self {
        self.burst = burst;
        self
    }

    /// Maximum time a waiting [`acquire`](crate::RateLimiter::acquire) may
    /// spend before failing with `Timeout`.
    ///
    /// Default: unlimited
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Substitutes the time source.
    ///
    /// Default: the monotonic system clock
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Gives this limiter a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a permit is granted, with the time waited.
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitAcquired { wait_duration, .. } = event {
                f(*wait_duration);
            }
        }));
        self
    }

    /// Registers a callback when a permit is rejected, with the retry-after
    /// hint.
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitRejected { retry_after, .. } = event {
                f(*retry_after);
            }
        }));
        self
    }

    /// Registers a callback when a waiting acquisition times out.
    pub fn on_wait_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::WaitTimeout { waited, .. } = event {
                f(*waited);
            }
        }));
        self
    }

    /// Builds the rate limiter.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is zero or `period` is zero.
    pub fn build(self) -> crate::RateLimiter {
        assert!(self.rate > 0, "rate must be positive");
        assert!(!self.period.is_zero(), "period must be positive");

        let config = RateLimiterConfig {
            rate: self.rate,
            period: self.period,
            burst: self.burst,
            max_wait: self.max_wait,
            clock: self.clock,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        crate::RateLimiter::from_config(config)
    }
}
