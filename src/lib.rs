//! # dcc-station
//!
//! Core of a DCC model railway command station: it turns per-locomotive
//! speed and direction requests into bi-phase modulated bit patterns held in
//! a DMA-streamed transmission buffer, and ramps each locomotive's
//! transmitted speed toward its throttle one step per tick.
//!
//! ## Features
//!
//! - **Bit-exact codec**: instruction ⇄ packet ⇄ stream ⇄ signal ⇄ bytes, every
//!   stage invertible and checksum verified
//! - **Transmission buffer**: one fixed-width slot per address behind a DMA
//!   control block, written through word-level peek/poke
//! - **Speed ramps**: per-address periodic tasks with separate accelerate and
//!   brake intervals, paused whenever a channel is at its throttle
//! - **Explicit lifecycle**: a registry owning buffer, ramps and scheduler
//!   with `start()`/`stop()` and emergency stop
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `codec` - Pure DCC encoding and decoding
//! - `buffer` - Slot layout over peripheral memory
//! - `ramp` - Per-address throttle state and tick logic
//! - `registry` - Lifecycle and control surface
//! - `traits` - Memory and scheduler abstractions
//! - `hal` - RAM-backed memory and test doubles
//! - `services` - Tokio scheduler (feature `runtime`)
//!
//! ## Example
//!
//! ```rust
//! use dcc_station::{
//!     hal::{ManualScheduler, MockMemory},
//!     ChannelRegistry, Config, Direction, Instruction,
//! };
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
//! // Ask locomotive 3 for speed 5; each tick moves one step
//! registry.set_throttle(3, 5).unwrap();
//! for _ in 0..5 {
//!     registry.scheduler().run_active();
//! }
//!
//! let slot = registry.buffer().read_instruction(3).unwrap();
//! assert_eq!(slot, Instruction::speed(3, Direction::Forward, 5).unwrap());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub use bitvec;

/// Transmission buffer slots and the DMA control block.
pub mod buffer;
/// DCC packet, stream and signal encoding.
pub mod codec;
/// Error taxonomy.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Logical instructions and directions.
pub mod instruction;
/// Core traits for memory access and task scheduling.
pub mod traits;

/// Station configuration.
pub mod config;

/// Per-address throttle state and speed ramps.
#[cfg(feature = "std")]
pub mod ramp;
/// Channel registry with start/stop lifecycle.
#[cfg(feature = "std")]
pub mod registry;

/// Tokio-backed runtime services.
#[cfg(feature = "runtime")]
pub mod services;

// Re-exports for convenience
pub use buffer::{ControlBlock, TransmissionBuffer};
pub use codec::{decode_from_bytes, encode_to_bytes, Packet};
pub use error::{DccError, Result};
pub use instruction::{Direction, Instruction, MAX_SHORT_ADDRESS, MAX_SPEED};
pub use traits::{PeriodicTask, RegisterAccess, Scheduler, TaskHandle};

#[cfg(feature = "std")]
pub use ramp::{ChannelTable, DirectionChange, RampProfile, RampTask};
#[cfg(feature = "std")]
pub use registry::{Channel, ChannelRegistry, ChannelStatus};

// Config re-exports
pub use config::{Config, DmaConfig, LayoutConfig, RampConfig, SchedulerConfig, StationConfig};
