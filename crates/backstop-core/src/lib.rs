//! Core infrastructure for the backstop resilience toolkit.
//!
//! This crate provides the pieces every backstop pattern shares:
//!
//! - [`Clock`]: an injectable monotonic time source, with [`ManualClock`]
//!   for deterministic tests
//! - [`Scheduler`]: a timer service for one-shot and fixed-rate callbacks
//! - [`EventListeners`]: the observability event plumbing
//! - [`PolicyError`]: a unified error type for composed policy stacks

pub mod clock;
pub mod error;
pub mod events;
pub mod scheduler;

pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use error::PolicyError;
pub use events::{BoxedEventListener, EventListener, EventListeners, FnListener, ResilienceEvent};
pub use scheduler::{Scheduler, TaskHandle};
