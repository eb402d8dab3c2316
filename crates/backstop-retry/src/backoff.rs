//! Backoff strategies.
//!
//! A closed set of tagged variants rather than a trait: the strategies form
//! a small, known family, and exhaustive matching keeps the delay arithmetic
//! in one place.

use rand::Rng;
use std::time::Duration;

/// Maps a 1-based attempt number to the delay before the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// The same delay between every attempt.
    Fixed {
        interval: Duration,
    },
    /// `min(max_delay, initial_delay * factor^(attempt - 1))`, optionally
    /// multiplied by a uniform jitter in `[0.9, 1.1)`.
    Exponential {
        initial_delay: Duration,
        max_delay: Duration,
        factor: f64,
        jitter: bool,
    },
    /// `min(max_delay, initial_delay + increment * (attempt - 1))`.
    Linear {
        initial_delay: Duration,
        increment: Duration,
        max_delay: Duration,
    },
}

impl BackoffStrategy {
    /// Fixed interval between attempts.
    pub fn fixed(interval: Duration) -> Self {
        BackoffStrategy::Fixed { interval }
    }

    /// Exponential backoff.
    pub fn exponential(
        initial_delay: Duration,
        max_delay: Duration,
        factor: f64,
        jitter: bool,
    ) -> Self {
        BackoffStrategy::Exponential {
            initial_delay,
            max_delay,
            factor,
            jitter,
        }
    }

    /// Linearly increasing backoff.
    pub fn linear(initial_delay: Duration, increment: Duration, max_delay: Duration) -> Self {
        BackoffStrategy::Linear {
            initial_delay,
            increment,
            max_delay,
        }
    }

    /// Computes the delay after the given 1-based attempt fails.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            BackoffStrategy::Fixed { interval } => interval,
            BackoffStrategy::Exponential {
                initial_delay,
                max_delay,
                factor,
                jitter,
            } => {
                let exponent = (attempt - 1).min(i32::MAX as u32) as i32;
                let raw = initial_delay.as_secs_f64() * factor.powi(exponent);
                let capped = raw.min(max_delay.as_secs_f64());
                let jittered = if jitter {
                    capped * rand::rng().random_range(0.9..1.1)
                } else {
                    capped
                };
                // powi can overflow to infinity for large attempts; the cap
                // above keeps the value finite, but guard the conversion.
                if jittered.is_finite() && jittered >= 0.0 {
                    Duration::from_secs_f64(jittered)
                } else {
                    max_delay
                }
            }
            BackoffStrategy::Linear {
                initial_delay,
                increment,
                max_delay,
            } => {
                let steps = (attempt - 1) as u64;
                let added_nanos = increment
                    .as_nanos()
                    .saturating_mul(steps as u128)
                    .min(u64::MAX as u128) as u64;
                initial_delay
                    .saturating_add(Duration::from_nanos(added_nanos))
                    .min(max_delay)
            }
        }
    }
}
