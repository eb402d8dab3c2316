use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::counter;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; failures are counted.
    Closed,
    /// Calls are rejected immediately with the remaining cooldown.
    Open,
    /// Trial calls run; successes count toward closing, any qualifying
    /// failure reopens.
    HalfOpen,
}

impl CircuitState {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// The state machine proper. Compound state (state, counters, transition
/// timestamp) is always read and mutated together under the owning
/// breaker's mutex; time enters as an explicit `now` so the clock seam
/// reaches every decision.
pub(crate) struct Circuit {
    state: CircuitState,
    failure_count: usize,
    half_open_successes: usize,
    last_transition: Instant,
}

impl Circuit {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            half_open_successes: 0,
            last_transition: now,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn failure_count(&self) -> usize {
        self.failure_count
    }

    pub(crate) fn time_since_last_transition(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_transition)
    }

    /// Decides whether a call may proceed at `now`.
    ///
    /// In Open, an elapsed cooldown transitions to HalfOpen and admits the
    /// call as a trial (the lazy half of the Open→HalfOpen transition);
    /// otherwise the remaining cooldown is returned.
    pub(crate) fn try_acquire<E>(
        &mut self,
        config: &CircuitBreakerConfig<E>,
        now: Instant,
    ) -> Result<(), Duration> {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => {
                config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallPermitted {
                        pattern_name: config.name.clone(),
                        timestamp: now,
                        state: self.state,
                    });
                Ok(())
            }
            CircuitState::Open => {
                let elapsed = self.time_since_last_transition(now);
                if elapsed >= config.reset_timeout {
                    self.transition_to(CircuitState::HalfOpen, config, now);
                    config
                        .event_listeners
                        .emit(&CircuitBreakerEvent::CallPermitted {
                            pattern_name: config.name.clone(),
                            timestamp: now,
                            state: self.state,
                        });
                    Ok(())
                } else {
                    config
                        .event_listeners
                        .emit(&CircuitBreakerEvent::CallRejected {
                            pattern_name: config.name.clone(),
                            timestamp: now,
                        });

                    #[cfg(feature = "metrics")]
                    counter!("circuitbreaker_rejections_total", "circuitbreaker" => config.name.clone())
                        .increment(1);

                    Err(config.reset_timeout - elapsed)
                }
            }
        }
    }

    pub(crate) fn record_success<E>(&mut self, config: &CircuitBreakerConfig<E>, now: Instant) {
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                pattern_name: config.name.clone(),
                timestamp: now,
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success")
            .increment(1);

        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                self.half_open_successes += 1;
                if self.half_open_successes >= config.test_attempts {
                    self.transition_to(CircuitState::Closed, config, now);
                }
            }
            // A trial that started in HalfOpen can complete after a
            // concurrent failure reopened the circuit; its result no longer
            // belongs to any window.
            CircuitState::Open => {}
        }
    }

    /// Records one qualifying failure (the caller has already applied the
    /// `should_trip` classifier). Returns true if this failure opened the
    /// circuit.
    pub(crate) fn record_failure<E>(
        &mut self,
        config: &CircuitBreakerConfig<E>,
        now: Instant,
    ) -> bool {
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                pattern_name: config.name.clone(),
                timestamp: now,
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure")
            .increment(1);

        match self.state {
            CircuitState::Closed => {
                self.failure_count += 1;
                if self.failure_count >= config.failure_threshold {
                    self.transition_to(CircuitState::Open, config, now);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Open, config, now);
                true
            }
            CircuitState::Open => false,
        }
    }

    /// The scheduled half of Open→HalfOpen: a no-op unless the circuit is
    /// still Open with its cooldown elapsed.
    pub(crate) fn check_reset<E>(&mut self, config: &CircuitBreakerConfig<E>, now: Instant) {
        if self.state == CircuitState::Open
            && self.time_since_last_transition(now) >= config.reset_timeout
        {
            self.transition_to(CircuitState::HalfOpen, config, now);
        }
    }

    fn transition_to<E>(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig<E>,
        now: Instant,
    ) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                pattern_name: config.name.clone(),
                timestamp: now,
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = ?from_state,
            to = ?state,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        counter!(
            "circuitbreaker_transitions_total",
            "circuitbreaker" => config.name.clone(),
            "from" => from_state.as_str(),
            "to" => state.as_str()
        )
        .increment(1);

        self.state = state;
        self.last_transition = now;
        // Entering Closed resets the failure count; entering HalfOpen
        // resets the trial-success count.
        self.failure_count = 0;
        self.half_open_successes = 0;
    }
}
