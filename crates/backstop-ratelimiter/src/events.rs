use backstop_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by the rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A permit was granted, after waiting `wait_duration` (zero for
    /// immediate grants).
    PermitAcquired {
        pattern_name: String,
        timestamp: Instant,
        wait_duration: Duration,
    },
    /// A permit was rejected without waiting.
    PermitRejected {
        pattern_name: String,
        timestamp: Instant,
        retry_after: Duration,
    },
    /// A waiting acquisition gave up after exceeding the maximum wait.
    WaitTimeout {
        pattern_name: String,
        timestamp: Instant,
        waited: Duration,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitAcquired { .. } => "PermitAcquired",
            RateLimiterEvent::PermitRejected { .. } => "PermitRejected",
            RateLimiterEvent::WaitTimeout { .. } => "WaitTimeout",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitAcquired { timestamp, .. }
            | RateLimiterEvent::PermitRejected { timestamp, .. }
            | RateLimiterEvent::WaitTimeout { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RateLimiterEvent::PermitAcquired { pattern_name, .. }
            | RateLimiterEvent::PermitRejected { pattern_name, .. }
            | RateLimiterEvent::WaitTimeout { pattern_name, .. } => pattern_name,
        }
    }
}
