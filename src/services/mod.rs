//! Runtime services for hosting a station on a desktop or single-board
//! computer.
//!
//! Requires the `runtime` feature.
//!
//! - [`TokioScheduler`]: a tokio-backed implementation of
//!   [`crate::traits::Scheduler`] that runs ramp ticks on worker threads.
//!
//! # Example
//!
//! ```rust
//! use dcc_station::hal::HeapMemory;
//! use dcc_station::services::TokioScheduler;
//! use dcc_station::{ChannelRegistry, Config};
//!
//! let config = Config::default();
//! let scheduler = TokioScheduler::new(&config.scheduler).unwrap();
//! let registry = ChannelRegistry::with_memory(
//!     HeapMemory::new(config.layout.memory_bytes()),
//!     scheduler,
//!     &config,
//! )
//! .unwrap();
//!
//! registry.start().unwrap();
//! registry.set_throttle(1, 4).unwrap();
//! registry.stop().unwrap();
//! ```

pub mod scheduler;

pub use scheduler::*;
