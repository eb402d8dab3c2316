//! Property-based tests for the backstop policies.
//!
//! Run with: cargo test --test property_tests
//!
//! proptest generates random configurations and verifies that the core
//! invariants hold across the whole parameter space, not just the values
//! picked in the example-based tests.

use backstop_core::{ManualClock, SharedClock};
use backstop_ratelimiter::{RateLimiter, RateLimiterError};
use backstop_retry::{BackoffStrategy, Retry};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn limiter_with_manual_clock(rate: u64, burst: u64, period: Duration) -> (ManualClock, RateLimiter) {
    let clock = ManualClock::new();
    let shared: SharedClock = Arc::new(clock.clone());
    let limiter = RateLimiter::builder(rate, period)
        .burst(burst)
        .clock(shared)
        .build();
    (clock, limiter)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Exactly `rate + burst` immediate acquisitions succeed from a full
    /// bucket; the next one is rejected.
    #[test]
    fn bucket_grants_exactly_its_capacity(
        rate in 1u64..=50,
        burst in 0u64..=50,
    ) {
        let (_clock, limiter) = limiter_with_manual_clock(rate, burst, Duration::from_secs(1));
        let capacity = rate + burst;
        prop_assert_eq!(limiter.capacity(), capacity);

        for _ in 0..capacity {
            prop_assert!(limiter.try_acquire(1).is_ok());
        }
        prop_assert!(limiter.try_acquire(1).is_err());
    }

    /// However long the bucket sits idle, refill never exceeds capacity.
    #[test]
    fn refill_is_capped_at_capacity(
        rate in 1u64..=20,
        burst in 0u64..=20,
        idle_periods in 1u32..=100,
    ) {
        let period = Duration::from_millis(100);
        let (clock, limiter) = limiter_with_manual_clock(rate, burst, period);
        let capacity = rate + burst;

        // Drain, idle, then count what refilled.
        for _ in 0..capacity {
            prop_assert!(limiter.try_acquire(1).is_ok());
        }
        clock.advance(period * idle_periods);

        let mut granted = 0u64;
        while limiter.try_acquire(1).is_ok() {
            granted += 1;
            prop_assert!(granted <= capacity, "granted {} > capacity {}", granted, capacity);
        }
        let expected = capacity.min(rate * u64::from(idle_periods));
        prop_assert_eq!(granted, expected);
    }

    /// A full idle period restores at least one rate's worth of permits.
    #[test]
    fn full_period_restores_at_least_rate(
        rate in 1u64..=20,
        burst in 0u64..=20,
    ) {
        let period = Duration::from_millis(100);
        let (clock, limiter) = limiter_with_manual_clock(rate, burst, period);

        for _ in 0..limiter.capacity() {
            prop_assert!(limiter.try_acquire(1).is_ok());
        }
        clock.advance(period);

        for _ in 0..rate.min(limiter.capacity()) {
            prop_assert!(limiter.try_acquire(1).is_ok());
        }
    }

    /// Rejections always carry a retry hint no longer than one period per
    /// missing token's worth of refill.
    #[test]
    fn retry_after_is_bounded(
        rate in 1u64..=20,
        permits in 1u64..=20,
    ) {
        let period = Duration::from_millis(100);
        let (_clock, limiter) = limiter_with_manual_clock(rate, 0, period);
        prop_assume!(permits <= limiter.capacity());

        for _ in 0..limiter.capacity() {
            prop_assert!(limiter.try_acquire(1).is_ok());
        }

        let err = limiter.try_acquire(permits).unwrap_err();
        let retry_after = match err {
            RateLimiterError::LimitExceeded { retry_after } => retry_after,
            other => panic!("unexpected {other:?}"),
        };
        // `permits` tokens need at most ceil(permits / rate) periods.
        let periods_needed = permits.div_ceil(rate);
        prop_assert!(retry_after <= period * periods_needed as u32);
        prop_assert!(retry_after > Duration::ZERO);
    }

    /// Without jitter, exponential backoff is non-decreasing and never
    /// exceeds the cap.
    #[test]
    fn exponential_backoff_is_monotonic_and_capped(
        initial_ms in 1u64..=1000,
        max_ms in 1u64..=60_000,
        factor in 1.0f64..=4.0,
        attempts in 2u32..=64,
    ) {
        let strategy = BackoffStrategy::exponential(
            Duration::from_millis(initial_ms),
            Duration::from_millis(max_ms),
            factor,
            false,
        );

        let mut previous = Duration::ZERO;
        for attempt in 1..=attempts {
            let delay = strategy.delay_for(attempt);
            prop_assert!(delay <= Duration::from_millis(max_ms));
            prop_assert!(delay >= previous);
            previous = delay;
        }
    }

    /// Linear backoff is non-decreasing and never exceeds the cap.
    #[test]
    fn linear_backoff_is_monotonic_and_capped(
        initial_ms in 0u64..=1000,
        increment_ms in 0u64..=1000,
        max_ms in 0u64..=60_000,
        attempts in 2u32..=64,
    ) {
        let strategy = BackoffStrategy::linear(
            Duration::from_millis(initial_ms),
            Duration::from_millis(increment_ms),
            Duration::from_millis(max_ms),
        );

        let mut previous = Duration::ZERO;
        for attempt in 1..=attempts {
            let delay = strategy.delay_for(attempt);
            prop_assert!(delay <= Duration::from_millis(max_ms));
            prop_assert!(delay >= previous);
            previous = delay;
        }
    }

    /// Jitter stays within its [0.9, 1.1) band of the un-jittered delay.
    #[test]
    fn jitter_stays_in_band(
        initial_ms in 1u64..=1000,
        attempt in 1u32..=16,
    ) {
        let base = BackoffStrategy::exponential(
            Duration::from_millis(initial_ms),
            Duration::from_secs(3600),
            2.0,
            false,
        )
        .delay_for(attempt);
        let jittered = BackoffStrategy::exponential(
            Duration::from_millis(initial_ms),
            Duration::from_secs(3600),
            2.0,
            true,
        )
        .delay_for(attempt);

        prop_assert!(jittered >= base.mul_f64(0.9));
        prop_assert!(jittered < base.mul_f64(1.1));
    }

    /// An always-failing operation runs exactly `max_attempts` times.
    #[test]
    fn retry_invokes_exactly_max_attempts(max_attempts in 1u32..=8) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let retry = Retry::builder(
                max_attempts,
                BackoffStrategy::fixed(Duration::from_millis(1)),
            )
            .build();

            let calls = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&calls);
            let result: Result<(), _> = retry
                .execute(|| {
                    let c = Arc::clone(&c);
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err("always".to_string())
                    }
                })
                .await;

            prop_assert!(result.is_err());
            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts as usize);
            Ok(())
        })?;
    }
}
