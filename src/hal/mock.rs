//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the memory and scheduler traits,
//! enabling development and testing on desktop without a DMA peripheral or
//! background threads.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockMemory`] | [`RegisterAccess`] | RAM that records every poke |
//! | [`ManualScheduler`] | [`Scheduler`] | Ticks only when the test says so |
//! | [`ManualHandle`] | [`TaskHandle`] | Counts pauses, resumes and reschedules |
//!
//! # Example
//!
//! ```rust
//! use dcc_station::hal::{ManualScheduler, MockMemory};
//! use dcc_station::{ChannelRegistry, Config};
//!
//! let config = Config::default();
//! let registry = ChannelRegistry::with_memory(
//!     MockMemory::for_layout(&config.layout),
//!     ManualScheduler::new(),
//!     &config,
//! )
//! .unwrap();
//! registry.start().unwrap();
//!
//! registry.set_throttle(3, 2).unwrap();
//! registry.scheduler().run_active();
//! registry.scheduler().run_active();
//! assert_eq!(registry.status(3).unwrap().speed, 2);
//! ```
//!
//! [`RegisterAccess`]: crate::traits::RegisterAccess
//! [`Scheduler`]: crate::traits::Scheduler
//! [`TaskHandle`]: crate::traits::TaskHandle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::HeapMemory;
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::traits::{PeriodicTask, RegisterAccess, Scheduler, TaskHandle};

// ============================================================================
// Memory Mock
// ============================================================================

/// Mock memory for testing.
///
/// Behaves like [`HeapMemory`] and additionally keeps a log of every
/// successful poke for verification.
///
/// # Example
///
/// ```rust
/// use dcc_station::hal::MockMemory;
/// use dcc_station::traits::RegisterAccess;
///
/// let memory = MockMemory::new(32);
/// memory.poke(4, 7).unwrap();
/// memory.poke(8, 9).unwrap();
///
/// assert_eq!(memory.poke_count(), 2);
/// assert_eq!(memory.pokes(), vec![(4, 7), (8, 9)]);
/// ```
#[derive(Debug)]
pub struct MockMemory {
    inner: HeapMemory,
    pokes: Mutex<Vec<(usize, u32)>>,
}

impl MockMemory {
    /// Creates `len` bytes of zeroed mock memory.
    pub fn new(len: usize) -> Self {
        Self {
            inner: HeapMemory::new(len),
            pokes: Mutex::new(Vec::new()),
        }
    }

    /// Creates mock memory large enough for `layout`.
    pub fn for_layout(layout: &LayoutConfig) -> Self {
        Self::new(layout.memory_bytes())
    }

    /// Every `(offset, value)` poked so far, oldest first.
    pub fn pokes(&self) -> Vec<(usize, u32)> {
        self.pokes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of pokes so far.
    pub fn poke_count(&self) -> usize {
        self.pokes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Forget the recorded pokes.
    pub fn clear_log(&self) {
        self.pokes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl RegisterAccess for MockMemory {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn peek(&self, offset: usize) -> Result<u32> {
        self.inner.peek(offset)
    }

    fn poke(&self, offset: usize, value: u32) -> Result<()> {
        self.inner.poke(offset, value)?;
        self.pokes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((offset, value));
        Ok(())
    }
}

// ============================================================================
// Scheduler Mocks
// ============================================================================

/// Snapshot of a [`ManualHandle`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManualTaskState {
    /// Whether the task is paused.
    pub paused: bool,
    /// Current interval.
    pub interval: Duration,
    /// Number of `reschedule` calls.
    pub reschedules: usize,
    /// Number of `resume` calls.
    pub resumes: usize,
    /// Number of `pause` calls.
    pub pauses: usize,
    /// Number of times the task has run.
    pub runs: usize,
}

/// Handle to a task scheduled on a [`ManualScheduler`].
///
/// Clones share state.
#[derive(Clone, Debug, Default)]
pub struct ManualHandle {
    state: Arc<Mutex<ManualTaskState>>,
}

impl ManualHandle {
    /// Current state snapshot.
    pub fn state(&self) -> ManualTaskState {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualTaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskHandle for ManualHandle {
    fn pause(&self) {
        let mut state = self.lock();
        state.paused = true;
        state.pauses += 1;
    }

    fn resume(&self) {
        let mut state = self.lock();
        state.paused = false;
        state.resumes += 1;
    }

    fn reschedule(&self, interval: Duration) {
        let mut state = self.lock();
        state.interval = interval;
        state.reschedules += 1;
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn interval(&self) -> Duration {
        self.lock().interval
    }
}

/// Scheduler whose tasks only run when [`run_active`](Self::run_active) is
/// called.
///
/// Intervals are recorded but not waited on, which makes ramp tests
/// deterministic. Tasks are indexed in scheduling order.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<(Arc<dyn PeriodicTask>, ManualHandle)>>,
    shut_down: AtomicBool,
}

impl ManualScheduler {
    /// Creates a scheduler with no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every unpaused task once, in scheduling order.
    ///
    /// Returns the number of tasks that ran. Nothing runs after shutdown.
    pub fn run_active(&self) -> usize {
        if self.is_shut_down() {
            return 0;
        }
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut ran = 0;
        for (task, handle) in tasks {
            if handle.is_paused() {
                continue;
            }
            task.run();
            handle.lock().runs += 1;
            ran += 1;
        }
        ran
    }

    /// Handle of the task scheduled at `index`.
    pub fn handle(&self, index: usize) -> Option<ManualHandle> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .map(|(_, handle)| handle.clone())
    }

    /// Number of scheduled tasks.
    pub fn task_count(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True once `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Scheduler for ManualScheduler {
    type Handle = ManualHandle;

    fn schedule_periodic(
        &self,
        interval: Duration,
        paused: bool,
        task: Arc<dyn PeriodicTask>,
    ) -> ManualHandle {
        let handle = ManualHandle::default();
        {
            let mut state = handle.lock();
            state.interval = interval;
            state.paused = paused;
        }
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((task, handle.clone()));
        handle
    }

    fn shutdown(&self, _timeout: Duration) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter(AtomicUsize);

    impl PeriodicTask for Counter {
        fn run(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    // =========================================================================
    // MockMemory Tests
    // =========================================================================

    #[test]
    fn mock_memory_logs_pokes() {
        let memory = MockMemory::new(16);
        memory.poke(0, 1).unwrap();
        memory.poke(12, 2).unwrap();
        assert_eq!(memory.pokes(), vec![(0, 1), (12, 2)]);
        assert_eq!(memory.peek(12), Ok(2));

        memory.clear_log();
        assert_eq!(memory.poke_count(), 0);
        assert_eq!(memory.peek(12), Ok(2));
    }

    #[test]
    fn mock_memory_failed_pokes_not_logged() {
        let memory = MockMemory::new(16);
        assert!(memory.poke(2, 1).is_err());
        assert!(memory.poke(16, 1).is_err());
        assert_eq!(memory.poke_count(), 0);
    }

    // =========================================================================
    // ManualScheduler Tests
    // =========================================================================

    #[test]
    fn paused_tasks_do_not_run() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let handle = scheduler.schedule_periodic(Duration::from_millis(200), true, counter.clone());

        assert_eq!(scheduler.run_active(), 0);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        handle.resume();
        assert_eq!(scheduler.run_active(), 1);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state().runs, 1);
    }

    #[test]
    fn handle_tracks_control_calls() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let handle = scheduler.schedule_periodic(Duration::from_millis(200), false, counter);

        handle.reschedule(Duration::from_millis(50));
        handle.pause();
        handle.resume();

        let state = handle.state();
        assert_eq!(state.interval, Duration::from_millis(50));
        assert_eq!(state.reschedules, 1);
        assert_eq!(state.pauses, 1);
        assert_eq!(state.resumes, 1);
        assert!(!state.paused);
        assert_eq!(scheduler.handle(0).unwrap().state(), state);
        assert_eq!(scheduler.task_count(), 1);
    }

    #[test]
    fn shutdown_stops_running() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        scheduler.schedule_periodic(Duration::from_millis(1), false, counter.clone());

        scheduler.shutdown(Duration::ZERO);
        assert!(scheduler.is_shut_down());
        assert_eq!(scheduler.run_active(), 0);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }
}
