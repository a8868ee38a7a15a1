//! Tokio-backed [`Scheduler`] for running ramp ticks on worker threads.
//!
//! The scheduler owns a multi-threaded runtime. Every scheduled task is one
//! spawned loop that sleeps for its interval and then runs the task; the
//! loop watches a `watch` channel carrying the task's pause flag and
//! interval, so pausing, resuming and rescheduling take effect immediately
//! without cancelling and respawning anything.
//!
//! Ticks run on the runtime's worker threads. Runs of one task never
//! overlap because a single loop drives it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dcc_station::config::SchedulerConfig;
//! use dcc_station::services::TokioScheduler;
//! use dcc_station::traits::{PeriodicTask, Scheduler, TaskHandle};
//!
//! struct Count(AtomicUsize);
//!
//! impl PeriodicTask for Count {
//!     fn run(&self) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let scheduler = TokioScheduler::new(&SchedulerConfig::default()).unwrap();
//! let count = Arc::new(Count(AtomicUsize::new(0)));
//! let handle = scheduler.schedule_periodic(Duration::from_millis(5), true, count.clone());
//! assert!(handle.is_paused());
//!
//! handle.resume();
//! std::thread::sleep(Duration::from_millis(100));
//! handle.pause();
//! assert!(count.0.load(Ordering::SeqCst) > 0);
//!
//! scheduler.shutdown(Duration::from_millis(100));
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::traits::{PeriodicTask, Scheduler, TaskHandle};

/// Schedule of one task as seen by its loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TaskState {
    paused: bool,
    interval: Duration,
}

// ============================================================================
// Task Handle
// ============================================================================

/// Handle to a task running on a [`TokioScheduler`].
#[derive(Clone, Debug)]
pub struct TokioTaskHandle {
    state: Arc<watch::Sender<TaskState>>,
}

impl TaskHandle for TokioTaskHandle {
    fn pause(&self) {
        self.state.send_if_modified(|state| {
            let changed = !state.paused;
            state.paused = true;
            changed
        });
    }

    fn resume(&self) {
        self.state.send_if_modified(|state| {
            let changed = state.paused;
            state.paused = false;
            changed
        });
    }

    fn reschedule(&self, interval: Duration) {
        self.state.send_modify(|state| state.interval = interval);
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn interval(&self) -> Duration {
        self.state.borrow().interval
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Periodic task scheduler on a dedicated multi-threaded tokio runtime.
pub struct TokioScheduler {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
}

impl TokioScheduler {
    /// Start the runtime with the configured number of worker threads.
    pub fn new(config: &SchedulerConfig) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("dcc-ramp")
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();
        info!(workers = config.worker_threads.max(1), "scheduler started");
        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
            handle,
        })
    }

    /// True until [`shutdown`](Scheduler::shutdown) has been called.
    pub fn is_running(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Scheduler for TokioScheduler {
    type Handle = TokioTaskHandle;

    fn schedule_periodic(
        &self,
        interval: Duration,
        paused: bool,
        task: Arc<dyn PeriodicTask>,
    ) -> TokioTaskHandle {
        let (tx, rx) = watch::channel(TaskState { paused, interval });
        self.handle.spawn(run_periodic(task, rx));
        TokioTaskHandle {
            state: Arc::new(tx),
        }
    }

    fn shutdown(&self, timeout: Duration) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_timeout(timeout);
            info!("scheduler stopped");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

/// Loop driving one task until its handle is dropped.
async fn run_periodic(task: Arc<dyn PeriodicTask>, mut rx: watch::Receiver<TaskState>) {
    loop {
        let state = *rx.borrow_and_update();
        if state.paused {
            if rx.changed().await.is_err() {
                break;
            }
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(state.interval) => {
                task.run();
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("periodic task finished");
}
