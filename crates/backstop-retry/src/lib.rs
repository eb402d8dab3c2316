//! Bounded retry loop with pluggable backoff strategies.
//!
//! [`Retry`] re-invokes a fallible async operation until it succeeds or
//! `max_attempts` is exhausted, sleeping between attempts according to a
//! [`BackoffStrategy`]. The caller gets exactly one future, resolved once
//! with the first success or the last failure; there is no retry-specific
//! error type — the final error is the operation's own, unchanged.
//!
//! The policy itself is stateless and cheap to clone; one instance can
//! drive any number of concurrent retry sequences.
//!
//! # Examples
//!
//! ```
//! use backstop_retry::{BackoffStrategy, Retry};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let retry = Retry::builder(
//!     5,
//!     BackoffStrategy::exponential(
//!         Duration::from_millis(100),
//!         Duration::from_secs(5),
//!         2.0,
//!         true,
//!     ),
//! )
//! .name("fetch-profile")
//! .on_retry(|attempt, delay| {
//!     eprintln!("attempt {attempt} failed; retrying in {delay:?}");
//! })
//! .build();
//!
//! let profile = retry
//!     .execute(|| async { Ok::<_, std::io::Error>("profile") })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod config;
mod events;

pub use backoff::BackoffStrategy;
pub use config::{RetryBuilder, RetryConfig};
pub use events::RetryEvent;

use std::future::Future;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use metrics::counter;

/// A bounded re-execution policy.
#[derive(Clone)]
pub struct Retry {
    config: Arc<RetryConfig>,
}

impl Retry {
    /// Creates a builder. Both parameters are mandatory: the total attempt
    /// budget (including the first attempt) and the backoff strategy.
    pub fn builder(max_attempts: u32, backoff: BackoffStrategy) -> RetryBuilder {
        RetryBuilder::new(max_attempts, backoff)
    }

    pub(crate) fn from_config(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Runs `op`, re-invoking it on failure until it succeeds or the
    /// attempt budget is exhausted.
    ///
    /// `op` is called once per attempt to produce a fresh future. The
    /// returned future resolves exactly once: with the first success, or
    /// with the last attempt's failure forwarded unchanged.
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 1;

        loop {
            match op().await {
                Ok(value) => {
                    self.config.event_listeners.emit(&RetryEvent::Success {
                        pattern_name: self.config.name.clone(),
                        timestamp: std::time::Instant::now(),
                        attempts: attempt,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("retry_outcomes_total", "retry" => self.config.name.clone(), "outcome" => "success")
                        .increment(1);

                    return Ok(value);
                }
                Err(error) => {
                    if attempt >= self.config.max_attempts {
                        self.config.event_listeners.emit(&RetryEvent::Exhausted {
                            pattern_name: self.config.name.clone(),
                            timestamp: std::time::Instant::now(),
                            attempts: attempt,
                        });

                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            retry = %self.config.name,
                            attempts = attempt,
                            "retry attempts exhausted"
                        );

                        #[cfg(feature = "metrics")]
                        counter!("retry_outcomes_total", "retry" => self.config.name.clone(), "outcome" => "exhausted")
                            .increment(1);

                        return Err(error);
                    }

                    let delay = self.config.backoff.delay_for(attempt);
                    self.config.event_listeners.emit(&RetryEvent::Retry {
                        pattern_name: self.config.name.clone(),
                        timestamp: std::time::Instant::now(),
                        attempt,
                        delay,
                    });

                    #[cfg(feature = "metrics")]
                    counter!("retry_attempts_total", "retry" => self.config.name.clone())
                        .increment(1);

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// The configured attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(u32);

    fn fixed_retry(max_attempts: u32) -> Retry {
        Retry::builder(max_attempts, BackoffStrategy::fixed(Duration::from_millis(5))).build()
    }

    #[tokio::test]
    async fn first_success_needs_no_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retry = fixed_retry(3);

        let c = Arc::clone(&calls);
        let result = retry
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retry = fixed_retry(5);

        let c = Arc::clone(&calls);
        let result = retry
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(TestError(n as u32))
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn always_failing_operation_runs_exactly_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retry = fixed_retry(4);

        let c = Arc::clone(&calls);
        let result: Result<(), _> = retry
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    Err(TestError(n as u32))
                }
            })
            .await;

        // The final failure is the last attempt's, unchanged.
        assert_eq!(result.unwrap_err(), TestError(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fixed_backoff_spaces_attempts() {
        let retry =
            Retry::builder(3, BackoffStrategy::fixed(Duration::from_millis(30))).build();

        let start = std::time::Instant::now();
        let result: Result<(), _> = retry.execute(|| async { Err(TestError(0)) }).await;
        assert!(result.is_err());

        // Two inter-attempt delays of 30ms each.
        assert!(start.elapsed() >= Duration::from_millis(55));
    }

    #[tokio::test]
    async fn events_report_one_based_attempts() {
        let reported = Arc::new(AtomicU32::new(0));
        let exhausted_at = Arc::new(AtomicU32::new(0));

        let r = Arc::clone(&reported);
        let x = Arc::clone(&exhausted_at);
        let retry = Retry::builder(3, BackoffStrategy::fixed(Duration::from_millis(1)))
            .on_retry(move |attempt, _| {
                r.fetch_max(attempt, Ordering::SeqCst);
            })
            .on_exhausted(move |attempts| {
                x.store(attempts, Ordering::SeqCst);
            })
            .build();

        let result: Result<(), _> = retry.execute(|| async { Err(TestError(0)) }).await;
        assert!(result.is_err());

        // Attempts 1 and 2 fail with a retry scheduled; attempt 3 exhausts.
        assert_eq!(reported.load(Ordering::SeqCst), 2);
        assert_eq!(exhausted_at.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn on_success_reports_total_attempts() {
        let attempts_seen = Arc::new(AtomicU32::new(0));
        let a = Arc::clone(&attempts_seen);

        let retry = Retry::builder(5, BackoffStrategy::fixed(Duration::from_millis(1)))
            .on_success(move |attempts| {
                a.store(attempts, Ordering::SeqCst);
            })
            .build();

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let _ = retry
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(TestError(0))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(attempts_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_policy_drives_concurrent_sequences() {
        let retry = fixed_retry(3);

        let mut handles = Vec::new();
        for i in 0..10u32 {
            let retry = retry.clone();
            handles.push(tokio::spawn(async move {
                let calls = AtomicUsize::new(0);
                retry
                    .execute(|| async {
                        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(TestError(i))
                        } else {
                            Ok(i)
                        }
                    })
                    .await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap().unwrap(), i as u32);
        }
    }
}
