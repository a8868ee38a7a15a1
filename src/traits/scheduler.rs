//! Periodic task scheduling.
//!
//! A [`Scheduler`] runs many independent [`PeriodicTask`]s, each at its own
//! interval. Every task is controlled through the [`TaskHandle`] returned
//! when it was scheduled: it can be paused, resumed, or moved to a new
//! interval. Runs of the same task never overlap.
//!
//! Implementations:
//!
//! - [`crate::services::TokioScheduler`]: worker threads on a tokio runtime
//!   (requires `runtime` feature)
//! - [`crate::hal::ManualScheduler`]: runs tasks only when a test asks

use alloc::sync::Arc;
use core::time::Duration;

/// Work executed on every tick of a scheduled task.
pub trait PeriodicTask: Send + Sync + 'static {
    /// Run one tick. Must not block for long.
    fn run(&self);
}

/// Control over one scheduled task.
pub trait TaskHandle: Send + Sync {
    /// Stop running the task until [`resume`](Self::resume) is called.
    fn pause(&self);

    /// Run the task again at its current interval.
    fn resume(&self);

    /// Change the interval; the next run is one new interval from now.
    fn reschedule(&self, interval: Duration);

    /// True while the task is paused.
    fn is_paused(&self) -> bool;

    /// Current interval.
    fn interval(&self) -> Duration;
}

/// A source of periodic execution.
pub trait Scheduler {
    /// Handle type returned for each scheduled task.
    type Handle: TaskHandle + 'static;

    /// Schedule `task` every `interval`, optionally starting paused.
    fn schedule_periodic(
        &self,
        interval: Duration,
        paused: bool,
        task: Arc<dyn PeriodicTask>,
    ) -> Self::Handle;

    /// Stop running tasks, waiting at most `timeout` for in-flight ticks.
    ///
    /// Default implementation does nothing.
    fn shutdown(&self, timeout: Duration) {
        let _ = timeout;
    }
}
