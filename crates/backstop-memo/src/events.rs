use backstop_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by the memoization cache.
#[derive(Debug, Clone)]
pub enum MemoEvent {
    /// A lookup was served from the cache.
    Hit {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A lookup missed; the computation was invoked.
    Miss {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A bounded cache displaced its least-recently-used entry to make room.
    Eviction {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for MemoEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MemoEvent::Hit { .. } => "Hit",
            MemoEvent::Miss { .. } => "Miss",
            MemoEvent::Eviction { .. } => "Eviction",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            MemoEvent::Hit { timestamp, .. }
            | MemoEvent::Miss { timestamp, .. }
            | MemoEvent::Eviction { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            MemoEvent::Hit { pattern_name, .. }
            | MemoEvent::Miss { pattern_name, .. }
            | MemoEvent::Eviction { pattern_name, .. } => pattern_name,
        }
    }
}
