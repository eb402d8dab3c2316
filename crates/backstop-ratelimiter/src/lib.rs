//! Token-bucket rate limiter for async operations.
//!
//! One [`RateLimiter`] instance guards exactly one protected resource but is
//! safe for any number of concurrent callers. Tokens accrue at `rate` per
//! `period` up to a capacity of `rate + burst`; each admitted operation
//! spends one token (or more, via the permit-taking variants).
//!
//! # Examples
//!
//! ```
//! use backstop_ratelimiter::RateLimiter;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // 100 operations per second, tolerating bursts of 20 extra.
//! let limiter = RateLimiter::builder(100, Duration::from_secs(1))
//!     .burst(20)
//!     .name("payments-api")
//!     .on_permit_rejected(|retry_after| {
//!         eprintln!("rate limited; retry after {retry_after:?}");
//!     })
//!     .build();
//!
//! let response = limiter
//!     .execute(|| async { Ok::<_, std::io::Error>("charged") })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod bucket;
mod config;
mod error;
mod events;

pub use config::{RateLimiterBuilder, RateLimiterConfig};
pub use error::RateLimiterError;
pub use events::RateLimiterEvent;

use crate::bucket::TokenBucket;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use metrics::counter;

/// A token-bucket admission gate.
///
/// Cloning is cheap and shares the same bucket, so clones still guard the
/// same resource.
#[derive(Clone)]
pub struct RateLimiter {
    config: Arc<RateLimiterConfig>,
    bucket: Arc<Mutex<TokenBucket>>,
}

impl RateLimiter {
    /// Creates a builder. `rate` tokens accrue per `period`; both are
    /// required.
    pub fn builder(rate: u64, period: Duration) -> RateLimiterBuilder {
        RateLimiterBuilder::new(rate, period)
    }

    pub(crate) fn from_config(config: RateLimiterConfig) -> Self {
        let bucket = TokenBucket::new(
            config.rate,
            config.burst,
            config.period,
            config.clock.now(),
        );
        Self {
            config: Arc::new(config),
            bucket: Arc::new(Mutex::new(bucket)),
        }
    }

    /// Total tokens the bucket can hold (`rate + burst`).
    pub fn capacity(&self) -> u64 {
        self.bucket.lock().capacity()
    }

    /// Attempts to take `permits` tokens without blocking or waiting.
    ///
    /// Fails with [`RateLimiterError::LimitExceeded`] carrying the time after
    /// which enough tokens will have accrued. Requests for more than
    /// [`capacity`](Self::capacity) permits can never succeed and are
    /// rejected outright.
    pub fn try_acquire(&self, permits: u64) -> Result<(), RateLimiterError> {
        // No amount of refilling satisfies an oversized request, so the
        // retry hint must not suggest one.
        if permits > self.capacity() {
            let retry_after = self.config.period;
            self.emit_rejected(retry_after);
            return Err(RateLimiterError::LimitExceeded { retry_after });
        }

        let now = self.config.clock.now();
        let result = self.bucket.lock().try_acquire(permits, now);

        match result {
            Ok(()) => {
                self.emit_acquired(Duration::ZERO);
                Ok(())
            }
            Err(retry_after) => {
                self.emit_rejected(retry_after);
                Err(RateLimiterError::LimitExceeded { retry_after })
            }
        }
    }

    /// Takes `permits` tokens, waiting for refills as needed.
    ///
    /// The wait happens inside the returned future via timed sleeps; nothing
    /// is scheduled on behalf of an abandoned caller. If the accumulated wait
    /// would exceed the configured `max_wait`, fails with
    /// [`RateLimiterError::Timeout`] without sleeping further.
    pub async fn acquire(&self, permits: u64) -> Result<(), RateLimiterError> {
        // Oversized requests would otherwise sleep forever.
        if permits > self.capacity() {
            let retry_after = self.config.period;
            self.emit_rejected(retry_after);
            return Err(RateLimiterError::LimitExceeded { retry_after });
        }

        let mut waited = Duration::ZERO;
        loop {
            let now = self.config.clock.now();
            let result = self.bucket.lock().try_acquire(permits, now);

            let retry_after = match result {
                Ok(()) => {
                    self.emit_acquired(waited);
                    return Ok(());
                }
                Err(retry_after) => retry_after,
            };

            if let Some(max_wait) = self.config.max_wait {
                if waited.saturating_add(retry_after) > max_wait {
                    self.emit_timeout(waited);
                    return Err(RateLimiterError::Timeout { waited });
                }
            }

            tokio::time::sleep(retry_after).await;
            waited = waited.saturating_add(retry_after);
        }
    }

    /// Runs `op` if a permit is immediately available; otherwise rejects
    /// without invoking it.
    ///
    /// The operation's own failure is forwarded unchanged as
    /// [`RateLimiterError::Inner`].
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, RateLimiterError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let now = self.config.clock.now();
        let result = self.bucket.lock().try_acquire(1, now);

        match result {
            Ok(()) => {
                self.emit_acquired(Duration::ZERO);
                op().await.map_err(RateLimiterError::Inner)
            }
            Err(retry_after) => {
                self.emit_rejected(retry_after);
                Err(RateLimiterError::LimitExceeded { retry_after })
            }
        }
    }

    fn emit_acquired(&self, wait_duration: Duration) {
        self.config
            .event_listeners
            .emit(&RateLimiterEvent::PermitAcquired {
                pattern_name: self.config.name.clone(),
                timestamp: self.config.clock.now(),
                wait_duration,
            });

        #[cfg(feature = "metrics")]
        counter!("ratelimiter_permits_total", "ratelimiter" => self.config.name.clone(), "outcome" => "acquired")
            .increment(1);
    }

    fn emit_rejected(&self, retry_after: Duration) {
        self.config
            .event_listeners
            .emit(&RateLimiterEvent::PermitRejected {
                pattern_name: self.config.name.clone(),
                timestamp: self.config.clock.now(),
                retry_after,
            });

        #[cfg(feature = "tracing")]
        tracing::debug!(limiter = %self.config.name, ?retry_after, "permit rejected");

        #[cfg(feature = "metrics")]
        counter!("ratelimiter_permits_total", "ratelimiter" => self.config.name.clone(), "outcome" => "rejected")
            .increment(1);
    }

    fn emit_timeout(&self, waited: Duration) {
        self.config
            .event_listeners
            .emit(&RateLimiterEvent::WaitTimeout {
                pattern_name: self.config.name.clone(),
                timestamp: self.config.clock.now(),
                waited,
            });

        #[cfg(feature = "metrics")]
        counter!("ratelimiter_permits_total", "ratelimiter" => self.config.name.clone(), "outcome" => "timeout")
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backstop_core::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn manual_limiter(rate: u64, burst: u64, period: Duration) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter = RateLimiter::builder(rate, period)
            .burst(burst)
            .clock(Arc::new(clock.clone()))
            .build();
        (limiter, clock)
    }

    #[test]
    fn capacity_consecutive_acquisitions_succeed_then_fail() {
        let (limiter, _clock) = manual_limiter(3, 2, Duration::from_secs(1));

        for _ in 0..5 {
            assert!(limiter.try_acquire(1).is_ok());
        }

        let err = limiter.try_acquire(1).unwrap_err();
        match err {
            RateLimiterError::LimitExceeded { retry_after } => {
                assert!(retry_after <= Duration::from_secs(1));
            }
            other => panic!("expected LimitExceeded, got {other:?}"),
        }
    }

    #[test]
    fn waiting_a_period_restores_rate_tokens() {
        let (limiter, clock) = manual_limiter(2, 0, Duration::from_secs(1));

        assert!(limiter.try_acquire(2).is_ok());
        assert!(limiter.try_acquire(1).is_err());

        clock.advance(Duration::from_secs(1));
        assert!(limiter.try_acquire(2).is_ok());
    }

    #[test]
    fn multi_permit_try_acquire() {
        let (limiter, _clock) = manual_limiter(5, 0, Duration::from_secs(1));

        assert!(limiter.try_acquire(3).is_ok());
        assert!(limiter.try_acquire(3).is_err());
        assert!(limiter.try_acquire(2).is_ok());
    }

    #[test]
    fn try_acquire_rejects_oversized_requests() {
        let (limiter, clock) = manual_limiter(2, 1, Duration::from_secs(1));

        let err = limiter.try_acquire(4).unwrap_err();
        assert!(matches!(err, RateLimiterError::LimitExceeded { .. }));

        // Even a fully refilled bucket cannot satisfy it.
        clock.advance(Duration::from_secs(5));
        assert!(limiter.try_acquire(4).is_err());

        // The bucket itself is untouched; a satisfiable request still works.
        assert!(limiter.try_acquire(3).is_ok());
    }

    #[tokio::test]
    async fn execute_rejects_without_invoking_operation() {
        let limiter = RateLimiter::builder(1, Duration::from_secs(10)).build();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        let first = limiter
            .execute(|| async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>("ok")
            })
            .await;
        assert_eq!(first.unwrap(), "ok");

        let c = Arc::clone(&calls);
        let second = limiter
            .execute(|| async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>("ok")
            })
            .await;
        assert!(matches!(
            second.unwrap_err(),
            RateLimiterError::LimitExceeded { .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn execute_forwards_inner_error() {
        let limiter = RateLimiter::builder(1, Duration::from_secs(1)).build();

        let result: Result<(), _> = limiter.execute(|| async { Err("downstream broke") }).await;
        match result.unwrap_err() {
            RateLimiterError::Inner(e) => assert_eq!(e, "downstream broke"),
            other => panic!("expected Inner, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let limiter = RateLimiter::builder(1, Duration::from_millis(50)).build();

        assert!(limiter.acquire(1).await.is_ok());

        let start = std::time::Instant::now();
        assert!(limiter.acquire(1).await.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn acquire_times_out_past_max_wait() {
        let limiter = RateLimiter::builder(1, Duration::from_secs(10))
            .max_wait(Duration::from_millis(20))
            .build();

        assert!(limiter.acquire(1).await.is_ok());

        let start = std::time::Instant::now();
        let err = limiter.acquire(1).await.unwrap_err();
        assert!(matches!(err, RateLimiterError::Timeout { .. }));
        // Rejected up front: the remaining wait already exceeds max_wait.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn acquire_rejects_oversized_requests() {
        let limiter = RateLimiter::builder(2, Duration::from_millis(10)).build();

        let err = limiter.acquire(3).await.unwrap_err();
        assert!(matches!(err, RateLimiterError::LimitExceeded { .. }));
    }

    #[tokio::test]
    async fn concurrent_callers_never_overspend() {
        let limiter = RateLimiter::builder(10, Duration::from_secs(10)).build();
        let granted = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            let granted = Arc::clone(&granted);
            handles.push(tokio::spawn(async move {
                if limiter.try_acquire(1).is_ok() {
                    granted.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(granted.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn listeners_observe_grants_and_rejections() {
        let acquired = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&acquired);
        let r = Arc::clone(&rejected);

        let limiter = RateLimiter::builder(1, Duration::from_secs(10))
            .on_permit_acquired(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_permit_rejected(move |_| {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        let _ = limiter.try_acquire(1);
        let _ = limiter.try_acquire(1);

        assert_eq!(acquired.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
    }
}
