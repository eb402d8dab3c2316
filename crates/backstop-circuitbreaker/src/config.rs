use crate::circuit::CircuitState;
use crate::events::CircuitBreakerEvent;
use backstop_core::{EventListeners, FnListener, MonotonicClock, Scheduler, SharedClock};
use std::sync::Arc;
use std::time::Duration;

/// Shared failure classifier: decides which operation errors count toward
/// tripping the circuit.
pub type SharedTripClassifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Configuration for a [`CircuitBreaker`](crate::CircuitBreaker).
pub struct CircuitBreakerConfig<E> {
    pub(crate) failure_threshold: usize,
    pub(crate) reset_timeout: Duration,
    pub(crate) test_attempts: usize,
    pub(crate) should_trip: SharedTripClassifier<E>,
    pub(crate) clock: SharedClock,
    pub(crate) scheduler: Scheduler,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

/// Builder for a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// `failure_threshold` and `reset_timeout` are required and taken by
/// [`CircuitBreaker::builder`](crate::CircuitBreaker::builder).
pub struct CircuitBreakerBuilder<E> {
    failure_threshold: usize,
    reset_timeout: Duration,
    test_attempts: usize,
    should_trip: SharedTripClassifier<E>,
    clock: SharedClock,
    scheduler: Scheduler,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl<E> CircuitBreakerBuilder<E> {
    pub(crate) fn new(failure_threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            test_attempts: 5,
            should_trip: Arc::new(|_| true),
            clock: Arc::new(MonotonicClock),
            scheduler: Scheduler::new(),
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Consecutive half-open successes required to close the circuit.
    ///
    /// Default: 5
    pub fn test_attempts(mut self, n: usize) -> Self {
        self.test_attempts = n;
        self
    }

    /// Sets the classifier deciding which errors count toward tripping.
    /// Non-qualifying failures are forwarded but neither counted nor reset
    /// anything.
    ///
    /// Default: every failure qualifies
    pub fn should_trip<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.should_trip = Arc::new(classifier);
        self
    }

    /// Substitutes the time source.
    ///
    /// Default: the monotonic system clock
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Substitutes the scheduler used for the automatic half-open check.
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Gives this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when the circuit transitions between states,
    /// called with `(from, to)`.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected by an open circuit.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback when a successful call is recorded, with the
    /// state it was recorded in.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Registers a callback when a qualifying failure is recorded, with the
    /// state it was recorded in.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    pub(crate) fn into_config(self) -> CircuitBreakerConfig<E> {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: self.reset_timeout,
            test_attempts: self.test_attempts,
            should_trip: self.should_trip,
            clock: self.clock,
            scheduler: self.scheduler,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Builds the circuit breaker.
    ///
    /// # Panics
    ///
    /// Panics if `failure_threshold` or `test_attempts` is zero.
    pub fn build(self) -> crate::CircuitBreaker<E> {
        assert!(
            self.failure_threshold > 0,
            "failure_threshold must be positive"
        );
        assert!(self.test_attempts > 0, "test_attempts must be positive");

        crate::CircuitBreaker::from_config(self.into_config())
    }
}
