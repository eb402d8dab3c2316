use std::time::Duration;
use thiserror::Error;

/// Errors raised while constructing an
/// [`IdempotencyCache`](crate::IdempotencyCache).
///
/// Operation failures are not wrapped: `execute` returns the operation's own
/// error type unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdempotencyError {
    /// The configured TTL was zero; cached results would expire instantly.
    #[error("idempotency ttl must be positive, got {0:?}")]
    InvalidTtl(Duration),
}
