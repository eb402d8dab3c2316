use backstop_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by the retry loop.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and a retry is about to be scheduled.
    Retry {
        pattern_name: String,
        timestamp: Instant,
        /// The 1-based attempt that just failed.
        attempt: u32,
        /// Delay before the next attempt.
        delay: Duration,
    },
    /// The operation succeeded.
    Success {
        pattern_name: String,
        timestamp: Instant,
        /// Total attempts made, including the successful one.
        attempts: u32,
    },
    /// All attempts were exhausted; the last failure is being returned.
    Exhausted {
        pattern_name: String,
        timestamp: Instant,
        attempts: u32,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "Retry",
            RetryEvent::Success { .. } => "Success",
            RetryEvent::Exhausted { .. } => "Exhausted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RetryEvent::Retry { pattern_name, .. }
            | RetryEvent::Success { pattern_name, .. }
            | RetryEvent::Exhausted { pattern_name, .. } => pattern_name,
        }
    }
}
