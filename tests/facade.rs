//! The `backstop` meta-crate re-exports each policy behind a feature flag;
//! this exercises the full-feature surface the way a downstream crate would.

use backstop::circuitbreaker::CircuitBreaker;
use backstop::core::PolicyError;
use backstop::idempotency::IdempotencyCache;
use backstop::memo::MemoCache;
use backstop::ratelimiter::RateLimiter;
use backstop::retry::{BackoffStrategy, Retry};
use std::time::Duration;

#[tokio::test]
async fn every_policy_is_reachable_through_the_facade() {
    let limiter = RateLimiter::builder(10, Duration::from_secs(1)).build();
    assert!(limiter.try_acquire(1).is_ok());

    let breaker: CircuitBreaker<String> =
        CircuitBreaker::builder(3, Duration::from_millis(100)).build();
    assert!(breaker
        .execute(|| async { Ok::<_, String>(1) })
        .await
        .is_ok());

    let retry = Retry::builder(2, BackoffStrategy::fixed(Duration::from_millis(1))).build();
    assert_eq!(
        retry.execute(|| async { Ok::<_, String>(2) }).await,
        Ok(2)
    );

    let cache: IdempotencyCache<String, u32, String> =
        IdempotencyCache::builder(Duration::from_secs(1))
            .build()
            .unwrap();
    assert_eq!(
        cache
            .execute("k".to_string(), || async { Ok::<_, String>(3) })
            .await,
        Ok(3)
    );

    let memo: MemoCache<String, u32> = MemoCache::unbounded();
    assert_eq!(
        memo.get("k".to_string(), || async { Ok::<_, String>(4) })
            .await,
        Ok(4)
    );

    let err: PolicyError<String> = PolicyError::Application("boom".to_string());
    assert!(err.is_application());
}
