use std::time::{Duration, Instant};

/// Internal token-bucket state.
///
/// All mutation happens inside one critical section per limiter instance;
/// the owning [`RateLimiter`](crate::RateLimiter) holds this behind a mutex.
/// Invariant: `0 <= tokens <= capacity`.
#[derive(Debug)]
pub(crate) struct TokenBucket {
    /// Maximum tokens the bucket can hold: `rate + burst`.
    capacity: u64,
    /// Tokens added per whole refill period.
    rate: u64,
    /// Duration of one refill period.
    period: Duration,
    /// Currently available tokens.
    tokens: u64,
    /// Start of the current (possibly partial) period. Advanced by whole
    /// periods only, so fractional progress toward the next refill is never
    /// lost.
    last_refill: Instant,
}

impl TokenBucket {
    pub(crate) fn new(rate: u64, burst: u64, period: Duration, now: Instant) -> Self {
        let capacity = rate.saturating_add(burst);
        Self {
            capacity,
            rate,
            period,
            tokens: capacity,
            last_refill: now,
        }
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> u64 {
        self.tokens
    }

    /// Attempts to take `permits` tokens at time `now`.
    ///
    /// On failure, returns how long the caller must wait before enough
    /// tokens will have accrued.
    pub(crate) fn try_acquire(&mut self, permits: u64, now: Instant) -> Result<(), Duration> {
        self.refill(now);

        if permits <= self.tokens {
            self.tokens -= permits;
            Ok(())
        } else {
            Err(self.retry_after(permits, now))
        }
    }

    /// Credits tokens for every whole period elapsed since `last_refill`,
    /// capped at capacity.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed < self.period {
            return;
        }

        let periods = (elapsed.as_nanos() / self.period.as_nanos()) as u64;
        let earned = periods.saturating_mul(self.rate);
        self.tokens = self.tokens.saturating_add(earned).min(self.capacity);

        // Advance by whole consumed periods only. Equivalent to stepping
        // `last_refill` forward `periods * period`, but immune to overflow
        // for pathological elapsed times.
        let remainder = elapsed.as_nanos() % self.period.as_nanos();
        self.last_refill = now - Duration::from_nanos(remainder as u64);
    }

    /// Remaining time in the current period, plus any additional whole
    /// periods needed to cover the deficit. Callers must have refilled
    /// first.
    fn retry_after(&self, permits: u64, now: Instant) -> Duration {
        let deficit = permits.saturating_sub(self.tokens);
        // The first refill boundary credits `rate` tokens; each further
        // whole period credits `rate` more.
        let extra_periods = deficit.saturating_sub(1) / self.rate.max(1);

        let into_period = now.saturating_duration_since(self.last_refill);
        let remaining = self.period.saturating_sub(into_period);

        let extra_nanos = (self.period.as_nanos())
            .saturating_mul(extra_periods as u128)
            .min(u64::MAX as u128) as u64;
        remaining.saturating_add(Duration::from_nanos(extra_nanos))
    }
}
