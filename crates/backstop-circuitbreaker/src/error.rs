use backstop_core::PolicyError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was rejected without attempt.
    #[error("circuit is open; call not permitted, retry after {retry_after:?}")]
    Open {
        /// Remaining cooldown before the next trial call is admitted.
        retry_after: Duration,
    },

    /// The wrapped operation failed; forwarded unchanged after the circuit
    /// updated its state.
    #[error("inner operation error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for PolicyError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::Open { retry_after } => PolicyError::CircuitOpen { retry_after },
            CircuitBreakerError::Inner(e) => PolicyError::Application(e),
        }
    }
}
