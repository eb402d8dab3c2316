//! Unified error type for composed policy stacks.
//!
//! Each backstop policy has its own typed error, generic over the wrapped
//! operation's error. When several policies are layered, [`PolicyError<E>`]
//! gives the stack one inspectable error type: the pattern crates provide
//! `From` conversions into it, so a composed stack needs no hand-written
//! error plumbing.

use std::time::Duration;
use thiserror::Error;

/// A common error type wrapping all backstop policy rejections.
///
/// # Type Parameters
///
/// - `E`: the application-specific error type from the wrapped operation
#[derive(Debug, Clone, Error)]
pub enum PolicyError<E> {
    /// The rate limiter rejected the call without invoking it.
    #[error("rate limited; retry after {retry_after:?}")]
    RateLimited {
        /// How long to wait before the next permit can be granted.
        retry_after: Duration,
    },

    /// A waiting permit acquisition exceeded its maximum wait.
    #[error("permit wait timed out after {waited:?}")]
    AcquireTimeout {
        /// How long the caller waited before giving up.
        waited: Duration,
    },

    /// The circuit breaker is open; the call was rejected without attempt.
    #[error("circuit is open; retry after {retry_after:?}")]
    CircuitOpen {
        /// Remaining cooldown before the circuit admits a trial call.
        retry_after: Duration,
    },

    /// The wrapped operation itself failed.
    #[error("application error: {0}")]
    Application(E),
}

impl<E> PolicyError<E> {
    /// Returns `true` if this is a rate limiter rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PolicyError::RateLimited { .. })
    }

    /// Returns `true` if this is a permit-wait timeout.
    pub fn is_acquire_timeout(&self) -> bool {
        matches!(self, PolicyError::AcquireTimeout { .. })
    }

    /// Returns `true` if this is a circuit breaker rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PolicyError::CircuitOpen { .. })
    }

    /// Returns `true` if this wraps an application error.
    pub fn is_application(&self) -> bool {
        matches!(self, PolicyError::Application(_))
    }

    /// Extracts the application error, if present.
    pub fn application_error(self) -> Option<E> {
        match self {
            PolicyError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// How long the caller should wait before retrying, when the policy
    /// knows.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PolicyError::RateLimited { retry_after } | PolicyError::CircuitOpen { retry_after } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }

    /// Maps the application error using a function.
    pub fn map_application<F, T>(self, f: F) -> PolicyError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            PolicyError::RateLimited { retry_after } => PolicyError::RateLimited { retry_after },
            PolicyError::AcquireTimeout { waited } => PolicyError::AcquireTimeout { waited },
            PolicyError::CircuitOpen { retry_after } => PolicyError::CircuitOpen { retry_after },
            PolicyError::Application(e) => PolicyError::Application(f(e)),
        }
    }
}

impl<E> PolicyError<PolicyError<E>> {
    /// Collapses one level of nesting.
    ///
    /// Composing policies wraps the inner stack's `PolicyError` as the outer
    /// policy's application error; flattening restores the single-level form
    /// callers match on.
    pub fn flatten(self) -> PolicyError<E> {
        match self {
            PolicyError::Application(inner) => inner,
            PolicyError::RateLimited { retry_after } => PolicyError::RateLimited { retry_after },
            PolicyError::AcquireTimeout { waited } => PolicyError::AcquireTimeout { waited },
            PolicyError::CircuitOpen { retry_after } => PolicyError::CircuitOpen { retry_after },
        }
    }
}

// From impls for each policy error live in the pattern crates to avoid
// circular dependencies.
