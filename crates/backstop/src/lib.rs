//! Composable flow-control and resilience policies for async Rust.
//!
//! `backstop` collects a family of policies that all share one calling
//! convention: hand the policy a thunk producing a future, get back a future
//! for the guarded result. Because every policy looks the same from the
//! outside, they nest without adapters.
//!
//! # Policies
//!
//! - **Rate limiter** (`ratelimiter` feature): token-bucket admission
//!   control with optional bounded waiting
//! - **Circuit breaker** (`circuitbreaker` feature): stops calling a
//!   dependency after consecutive failures, probes it after a cooldown
//! - **Retry** (`retry` feature): bounded re-execution with fixed,
//!   exponential, or linear backoff
//! - **Idempotency** (`idempotency` feature): at-most-once execution per
//!   key within a TTL window, coalescing concurrent duplicates
//! - **Memo** (`memo` feature): success-only memoization with optional LRU
//!   bounds
//!
//! # Usage
//!
//! Enable specific policies via features:
//!
//! ```toml
//! [dependencies]
//! backstop = { version = "0.1", features = ["ratelimiter", "retry"] }
//! ```
//!
//! Or enable all of them:
//!
//! ```toml
//! [dependencies]
//! backstop = { version = "0.1", features = ["full"] }
//! ```
//!
//! # Composition
//!
//! Policies wrap from the inside out; the innermost runs closest to the
//! operation:
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "ratelimiter", feature = "retry"))]
//! # {
//! use backstop::ratelimiter::RateLimiter;
//! use backstop::retry::{BackoffStrategy, Retry};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::builder(100, Duration::from_secs(1)).build();
//! let retry = Retry::builder(
//!     3,
//!     BackoffStrategy::exponential(
//!         Duration::from_millis(50),
//!         Duration::from_secs(2),
//!         2.0,
//!         true,
//!     ),
//! )
//! .build();
//!
//! let value = retry
//!     .execute(|| limiter.execute(|| async { Ok::<_, std::io::Error>(42) }))
//!     .await?;
//! # Ok(())
//! # }
//! # }
//! ```
//!
//! For a composed stack's error handling, [`core::PolicyError`] flattens
//! every policy's rejection into one inspectable type via `From`.
//!
//! # Individual crates
//!
//! Each policy is also available standalone for minimal dependencies:
//! `backstop-ratelimiter`, `backstop-circuitbreaker`, `backstop-retry`,
//! `backstop-idempotency`, `backstop-memo`, and `backstop-core` (shared
//! infrastructure: clock, scheduler, events, composition error).

// Re-export core (always available)
pub use backstop_core as core;

// Re-export policies based on features
#[cfg(feature = "ratelimiter")]
pub use backstop_ratelimiter as ratelimiter;

#[cfg(feature = "circuitbreaker")]
pub use backstop_circuitbreaker as circuitbreaker;

#[cfg(feature = "retry")]
pub use backstop_retry as retry;

#[cfg(feature = "idempotency")]
pub use backstop_idempotency as idempotency;

#[cfg(feature = "memo")]
pub use backstop_memo as memo;
