//! Three-state circuit breaker for async operations.
//!
//! A [`CircuitBreaker`] tracks qualifying failures of the operation it
//! guards. After `failure_threshold` consecutive qualifying failures the
//! circuit opens and calls fail fast with the remaining cooldown; once
//! `reset_timeout` elapses the next call (or a scheduled check, whichever
//! comes first) moves it to half-open, where `test_attempts` consecutive
//! successes close it again and any qualifying failure reopens it.
//!
//! One instance guards exactly one resource; clones share state and are safe
//! for concurrent callers.
//!
//! # Examples
//!
//! ```
//! use backstop_circuitbreaker::CircuitBreaker;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker: CircuitBreaker<std::io::Error> =
//!     CircuitBreaker::builder(5, Duration::from_secs(30))
//!         .test_attempts(2)
//!         .name("inventory-service")
//!         .on_state_transition(|from, to| {
//!             eprintln!("circuit: {from:?} -> {to:?}");
//!         })
//!         .build();
//!
//! let result = breaker
//!     .execute(|| async { Ok::<_, std::io::Error>("stock: 7") })
//!     .await;
//! # let _ = result;
//! # }
//! ```

mod circuit;
mod config;
mod error;
mod events;

pub use circuit::CircuitState;
pub use config::{CircuitBreakerBuilder, CircuitBreakerConfig, SharedTripClassifier};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;

use crate::circuit::Circuit;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A failure-tracking admission gate.
pub struct CircuitBreaker<E> {
    config: Arc<CircuitBreakerConfig<E>>,
    circuit: Arc<Mutex<Circuit>>,
}

impl<E> Clone for CircuitBreaker<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            circuit: Arc::clone(&self.circuit),
        }
    }
}

impl<E> CircuitBreaker<E> {
    /// Creates a builder. Both parameters are required: the circuit opens
    /// after `failure_threshold` consecutive qualifying failures and stays
    /// open for `reset_timeout`.
    pub fn builder(failure_threshold: usize, reset_timeout: Duration) -> CircuitBreakerBuilder<E> {
        CircuitBreakerBuilder::new(failure_threshold, reset_timeout)
    }

    pub(crate) fn from_config(config: CircuitBreakerConfig<E>) -> Self {
        let circuit = Circuit::new(config.clock.now());
        Self {
            config: Arc::new(config),
            circuit: Arc::new(Mutex::new(circuit)),
        }
    }

    /// Current state of the circuit.
    pub fn state(&self) -> CircuitState {
        self.circuit.lock().state()
    }

    /// Qualifying failures counted in the current closed window.
    pub fn failure_count(&self) -> usize {
        self.circuit.lock().failure_count()
    }

    /// Time elapsed since the last state transition (or construction).
    pub fn time_since_last_state_change(&self) -> Duration {
        let now = self.config.clock.now();
        self.circuit.lock().time_since_last_transition(now)
    }

    /// Runs `op` through the circuit.
    ///
    /// Open circuits reject with [`CircuitBreakerError::Open`] without
    /// invoking `op`. Otherwise the operation runs, its outcome updates the
    /// circuit (qualifying failures counted, successes reset or close), and
    /// its own failure is forwarded unchanged as
    /// [`CircuitBreakerError::Inner`].
    pub async fn execute<F, Fut, T>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Send + Sync + 'static,
    {
        {
            let now = self.config.clock.now();
            let mut circuit = self.circuit.lock();
            if let Err(retry_after) = circuit.try_acquire(&self.config, now) {
                return Err(CircuitBreakerError::Open { retry_after });
            }
        }

        let result = op().await;

        let now = self.config.clock.now();
        match &result {
            Ok(_) => {
                self.circuit.lock().record_success(&self.config, now);
            }
            Err(e) => {
                if (self.config.should_trip)(e) {
                    let opened = self.circuit.lock().record_failure(&self.config, now);
                    if opened {
                        self.schedule_half_open_check();
                    }
                }
            }
        }

        result.map_err(CircuitBreakerError::Inner)
    }

    /// One scheduled check per Open transition: if the circuit is still
    /// open when the cooldown elapses, move it to half-open so recovery
    /// does not depend on traffic arriving.
    fn schedule_half_open_check(&self)
    where
        E: Send + Sync + 'static,
    {
        let circuit = Arc::clone(&self.circuit);
        let config = Arc::clone(&self.config);
        self.config
            .scheduler
            .schedule(self.config.reset_timeout, move || {
                let now = config.clock.now();
                circuit.lock().check_reset(&config, now);
            });
    }
}
