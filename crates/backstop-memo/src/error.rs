use thiserror::Error;

/// Errors raised while constructing a [`MemoCache`](crate::MemoCache).
///
/// Compute failures are not wrapped: `get` returns the computation's own
/// error type unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoError {
    /// A bounded cache was requested with capacity zero.
    #[error("memo cache capacity must be positive, got {0}")]
    InvalidCapacity(usize),
}
