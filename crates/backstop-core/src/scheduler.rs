//! Timer service for delayed and periodic callbacks.
//!
//! Policies that need time-driven behavior outside a caller's own future
//! (the circuit breaker's half-open check, the idempotency cache's periodic
//! sweep) go through a [`Scheduler`] instead of spawning tasks ad hoc. The
//! scheduler is a lightweight handle over the current tokio runtime, passed
//! or defaulted into each policy builder so tests can observe and cancel
//! what was scheduled.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Schedules callbacks onto the current tokio runtime.
///
/// Must be used from within a runtime; both methods spawn a task.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    /// Creates a scheduler.
    pub fn new() -> Self {
        Self
    }

    /// Runs `f` once after `delay`.
    ///
    /// The returned handle can cancel the callback before it fires; once it
    /// has fired the handle is inert.
    pub fn schedule<F>(&self, delay: Duration, f: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run_guarded(f);
        });
        TaskHandle { inner: handle }
    }

    /// Runs `f` repeatedly, every `interval`, until the returned handle is
    /// cancelled or the process exits. The first run happens one interval
    /// after scheduling.
    ///
    /// A panic in one iteration is caught and logged; it never cancels the
    /// remaining iterations.
    pub fn schedule_at_fixed_rate<F>(&self, interval: Duration, f: F) -> TaskHandle
    where
        F: Fn() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval() fires immediately on the first tick; the contract
            // here is "first run after one interval".
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_guarded(&f);
            }
        });
        TaskHandle { inner: handle }
    }
}

fn run_guarded<F: FnOnce()>(f: F) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        #[cfg(feature = "tracing")]
        tracing::warn!("scheduled task panicked; suppressing");
    }
}

/// Handle to a scheduled task.
///
/// Dropping the handle does *not* cancel the task; call [`TaskHandle::cancel`]
/// for that. This keeps lifecycle ownership explicit: the owning policy
/// decides when its background work stops.
#[derive(Debug)]
pub struct TaskHandle {
    inner: JoinHandle<()>,
}

impl TaskHandle {
    /// Cancels the scheduled task. Idempotent.
    pub fn cancel(&self) {
        self.inner.abort();
    }

    /// Returns true if the task has finished or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}
