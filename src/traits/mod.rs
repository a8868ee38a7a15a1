//! Trait definitions for memory access and task scheduling.
//!
//! These abstractions let the station run against real DMA memory and a
//! threaded scheduler, or against plain RAM and a test-driven scheduler.
//!
//! # Submodules
//!
//! - `memory`: word peek/poke over the transmitted region
//! - `scheduler`: periodic tasks with pause/resume/reschedule
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`RegisterAccess`] | Aligned word reads/writes of peripheral memory |
//! | [`Scheduler`] | Runs periodic tasks |
//! | [`TaskHandle`] | Pauses, resumes and retimes one task |
//! | [`PeriodicTask`] | The work done on each tick |

pub mod memory;
pub mod scheduler;

pub use memory::*;
pub use scheduler::*;
