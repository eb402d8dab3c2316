use backstop_core::PolicyError;
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the [`RateLimiter`](crate::RateLimiter).
///
/// `E` is the wrapped operation's error type; plain permit operations
/// (`try_acquire`, `acquire`) use the `Infallible` default since no inner
/// operation is involved.
#[derive(Debug, Clone, Error)]
pub enum RateLimiterError<E = Infallible> {
    /// No permit was available; the call was rejected without attempt.
    #[error("rate limit exceeded; retry after {retry_after:?}")]
    LimitExceeded {
        /// How long until enough tokens will have accrued.
        retry_after: Duration,
    },

    /// A waiting acquisition exceeded the configured maximum wait.
    #[error("timed out after waiting {waited:?} for a permit")]
    Timeout {
        /// How long the caller waited before giving up.
        waited: Duration,
    },

    /// The wrapped operation failed after its permit was granted.
    #[error("inner operation error: {0}")]
    Inner(E),
}

impl<E> RateLimiterError<E> {
    /// Returns true if the call was rejected by the limiter itself.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, RateLimiterError::Inner(_))
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RateLimiterError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<RateLimiterError<E>> for PolicyError<E> {
    fn from(err: RateLimiterError<E>) -> Self {
        match err {
            RateLimiterError::LimitExceeded { retry_after } => {
                PolicyError::RateLimited { retry_after }
            }
            RateLimiterError::Timeout { waited } => PolicyError::AcquireTimeout { waited },
            RateLimiterError::Inner(e) => PolicyError::Application(e),
        }
    }
}
