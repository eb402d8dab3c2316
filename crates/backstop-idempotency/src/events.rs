use backstop_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by the idempotency cache.
#[derive(Debug, Clone)]
pub enum IdempotencyEvent {
    /// A call was served from a resolved, unexpired slot without invoking
    /// the operation.
    CacheHit {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A call attached to an in-flight execution for the same key.
    Coalesced {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A call became the creator for its key and ran the operation to a
    /// successful result.
    Executed {
        pattern_name: String,
        timestamp: Instant,
    },
    /// The creator's operation failed; the error was propagated and nothing
    /// was cached.
    FailureDiscarded {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A background sweep finished.
    SweepCompleted {
        pattern_name: String,
        timestamp: Instant,
        /// Number of expired slots removed by this sweep.
        removed: usize,
    },
}

impl ResilienceEvent for IdempotencyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            IdempotencyEvent::CacheHit { .. } => "CacheHit",
            IdempotencyEvent::Coalesced { .. } => "Coalesced",
            IdempotencyEvent::Executed { .. } => "Executed",
            IdempotencyEvent::FailureDiscarded { .. } => "FailureDiscarded",
            IdempotencyEvent::SweepCompleted { .. } => "SweepCompleted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            IdempotencyEvent::CacheHit { timestamp, .. }
            | IdempotencyEvent::Coalesced { timestamp, .. }
            | IdempotencyEvent::Executed { timestamp, .. }
            | IdempotencyEvent::FailureDiscarded { timestamp, .. }
            | IdempotencyEvent::SweepCompleted { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            IdempotencyEvent::CacheHit { pattern_name, .. }
            | IdempotencyEvent::Coalesced { pattern_name, .. }
            | IdempotencyEvent::Executed { pattern_name, .. }
            | IdempotencyEvent::FailureDiscarded { pattern_name, .. }
            | IdempotencyEvent::SweepCompleted { pattern_name, .. } => pattern_name,
        }
    }
}
