//! The channel registry: explicit owner of the buffer, ramps and scheduler.
//!
//! One `ChannelRegistry` is built at process start and shared by reference
//! with everything that drives trains. Construction schedules one paused
//! ramp task per address; [`start`](ChannelRegistry::start) puts the slots
//! into their initial state and [`stop`](ChannelRegistry::stop) (or drop)
//! brings every train to rest and shuts the scheduler down.
//!
//! # Lifecycle
//!
//! ```text
//! new ──▶ Created ──start()──▶ Running ──stop()──▶ Stopped
//! ```
//!
//! Control operations are only accepted while running. Between
//! [`emergency_stop`](ChannelRegistry::emergency_stop) and
//! [`clear_stop`](ChannelRegistry::clear_stop) no train may be given a
//! non-zero throttle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, warn};

use crate::buffer::TransmissionBuffer;
use crate::config::Config;
use crate::error::{DccError, Result};
use crate::instruction::{Direction, Instruction};
use crate::ramp::{ChannelTable, DirectionChange, RampProfile, RampTask};
use crate::traits::{RegisterAccess, Scheduler};

// ============================================================================
// Status
// ============================================================================

/// Snapshot of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelStatus {
    /// Track address
    pub address: u8,
    /// Requested speed
    pub throttle: u8,
    /// Speed currently transmitted
    pub speed: u8,
    /// Direction currently transmitted
    pub direction: Direction,
    /// True while the ramp is still moving toward the throttle
    pub ramping: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

// ============================================================================
// Registry
// ============================================================================

/// Owns the per-address channel table and the scheduler driving its ramps.
///
/// # Example
///
/// ```rust
/// use dcc_station::hal::{ManualScheduler, MockMemory};
/// use dcc_station::{ChannelRegistry, Config, Direction};
///
/// let config = Config::default();
/// let registry = ChannelRegistry::with_memory(
///     MockMemory::for_layout(&config.layout),
///     ManualScheduler::new(),
///     &config,
/// )
/// .unwrap();
/// registry.start().unwrap();
///
/// let cab = registry.channel(3).unwrap();
/// cab.set_direction(Direction::Reverse).unwrap();
/// cab.set_throttle(1).unwrap();
/// registry.scheduler().run_active();
///
/// let status = cab.status().unwrap();
/// assert_eq!(status.speed, 1);
/// assert_eq!(status.direction, Direction::Reverse);
///
/// registry.stop().unwrap();
/// ```
pub struct ChannelRegistry<M, S>
where
    M: RegisterAccess + 'static,
    S: Scheduler,
{
    table: Arc<ChannelTable<M, S::Handle>>,
    scheduler: S,
    lifecycle: Mutex<Lifecycle>,
    stop_active: AtomicBool,
    shutdown_timeout: Duration,
}

impl<M, S> ChannelRegistry<M, S>
where
    M: RegisterAccess + 'static,
    S: Scheduler,
{
    /// Build the registry, scheduling one paused ramp task per address.
    pub fn new(buffer: TransmissionBuffer<M>, scheduler: S, config: &Config) -> Result<Self> {
        let profile = RampProfile::from_config(&config.ramp);
        let table = Arc::new(ChannelTable::new(buffer, profile));

        for address in 1..=table.max_addr() {
            let task = Arc::new(RampTask::new(address, Arc::clone(&table)));
            let handle = scheduler.schedule_periodic(profile.accelerate, true, task);
            table.attach(address, handle)?;
        }

        info!(
            station = config.station.name.as_str(),
            channels = table.max_addr(),
            "channel registry created"
        );
        Ok(Self {
            table,
            scheduler,
            lifecycle: Mutex::new(Lifecycle::Created),
            stop_active: AtomicBool::new(false),
            shutdown_timeout: config.scheduler.shutdown_timeout(),
        })
    }

    /// Build the buffer over `memory` from `config`, then the registry.
    pub fn with_memory(memory: M, scheduler: S, config: &Config) -> Result<Self> {
        let buffer = TransmissionBuffer::from_config(memory, config)?;
        Self::new(buffer, scheduler, config)
    }

    /// Initialise every slot and begin accepting control operations.
    ///
    /// Calling `start` on a running registry does nothing; a stopped
    /// registry cannot be restarted.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        match *lifecycle {
            Lifecycle::Running => Ok(()),
            Lifecycle::Stopped => Err(DccError::NotRunning),
            Lifecycle::Created => {
                self.table.buffer().initialise_slots()?;
                *lifecycle = Lifecycle::Running;
                info!("station started");
                Ok(())
            }
        }
    }

    /// Bring every channel to rest and shut the scheduler down.
    ///
    /// Every channel is attempted even if one fails; the first failure is
    /// returned. The scheduler is given the configured timeout to finish
    /// in-flight ticks.
    pub fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        let previous = *lifecycle;
        if previous == Lifecycle::Stopped {
            return Ok(());
        }
        *lifecycle = Lifecycle::Stopped;

        let mut outcome = Ok(());
        if previous == Lifecycle::Running {
            outcome = self.halt_all();
            if let Err(e) = self.table.buffer().poke_instruction(0, &Instruction::Idle) {
                outcome = outcome.and(Err(e));
            }
        } else {
            for address in 1..=self.max_addr() {
                if let Err(e) = self.table.pause(address) {
                    warn!(address, error = %e, "failed to pause ramp");
                }
            }
        }

        self.scheduler.shutdown(self.shutdown_timeout);
        info!("station stopped");
        outcome
    }

    /// True between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        *self.lifecycle() == Lifecycle::Running
    }

    /// Request a new target speed for `address`.
    ///
    /// While a broadcast stop is active only a throttle of 0 is accepted.
    pub fn set_throttle(&self, address: u8, throttle: u8) -> Result<()> {
        self.ensure_running()?;
        if throttle != 0 && self.is_stop_active() {
            return Err(DccError::StopActive);
        }
        self.table.set_throttle(address, throttle)
    }

    /// Change the direction of a stationary channel.
    pub fn set_direction(&self, address: u8, direction: Direction) -> Result<DirectionChange> {
        self.ensure_running()?;
        self.table.set_direction(address, direction)
    }

    /// Replace the ramp intervals of `address`.
    pub fn set_ramp_profile(&self, address: u8, profile: RampProfile) -> Result<()> {
        self.ensure_running()?;
        self.table.set_profile(address, profile)
    }

    /// Snapshot of `address`.
    pub fn status(&self, address: u8) -> Result<ChannelStatus> {
        self.ensure_running()?;
        self.table.status(address)
    }

    /// Snapshots of every channel, in address order.
    pub fn statuses(&self) -> Result<Vec<ChannelStatus>> {
        self.ensure_running()?;
        (1..=self.max_addr())
            .map(|address| self.table.status(address))
            .collect()
    }

    /// Handle bound to one address.
    pub fn channel(&self, address: u8) -> Result<Channel<'_, M, S>> {
        if address == 0 || address > self.max_addr() {
            return Err(DccError::AddressOutOfRange {
                address,
                max: self.max_addr(),
            });
        }
        Ok(Channel {
            registry: self,
            address,
        })
    }

    /// Stop every train immediately and broadcast a Stop packet.
    ///
    /// Throttles and transmitted speeds drop to 0 without ramping. Slot 0
    /// keeps transmitting Stop until [`clear_stop`](Self::clear_stop), and
    /// until then [`set_throttle`](Self::set_throttle) rejects anything but 0
    /// with [`DccError::StopActive`].
    pub fn emergency_stop(&self, emergency: bool) -> Result<()> {
        self.ensure_running()?;
        self.stop_active.store(true, Ordering::SeqCst);
        let outcome = self.halt_all();
        self.table
            .buffer()
            .poke_instruction(0, &Instruction::Stop { emergency })?;
        warn!(emergency, "all channels stopped");
        outcome
    }

    /// Return slot 0 to Idle after an emergency stop.
    pub fn clear_stop(&self) -> Result<()> {
        self.ensure_running()?;
        self.table.buffer().poke_instruction(0, &Instruction::Idle)?;
        self.stop_active.store(false, Ordering::SeqCst);
        info!("stop cleared");
        Ok(())
    }

    /// True between `emergency_stop` and `clear_stop`.
    pub fn is_stop_active(&self) -> bool {
        self.stop_active.load(Ordering::SeqCst)
    }

    /// Instruction currently transmitted in slot 0.
    pub fn broadcast(&self) -> Result<Instruction> {
        self.table.buffer().read_instruction(0)
    }

    /// Highest drivable address.
    pub fn max_addr(&self) -> u8 {
        self.table.max_addr()
    }

    /// The scheduler running the ramps.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// The shared transmission buffer.
    pub fn buffer(&self) -> &TransmissionBuffer<M> {
        self.table.buffer()
    }

    fn halt_all(&self) -> Result<()> {
        let mut outcome = Ok(());
        for address in 1..=self.max_addr() {
            if let Err(e) = self.table.halt(address) {
                warn!(address, error = %e, "failed to halt channel");
                outcome = outcome.and(Err(e));
            }
        }
        outcome
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(DccError::NotRunning)
        }
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M, S> Drop for ChannelRegistry<M, S>
where
    M: RegisterAccess + 'static,
    S: Scheduler,
{
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "station did not stop cleanly");
        }
    }
}

// ============================================================================
// Channel Handle
// ============================================================================

/// One address of a [`ChannelRegistry`], for callers driving a single train.
pub struct Channel<'a, M, S>
where
    M: RegisterAccess + 'static,
    S: Scheduler,
{
    registry: &'a ChannelRegistry<M, S>,
    address: u8,
}

impl<M, S> Channel<'_, M, S>
where
    M: RegisterAccess + 'static,
    S: Scheduler,
{
    /// Address this handle drives.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Request a new target speed.
    pub fn set_throttle(&self, throttle: u8) -> Result<()> {
        self.registry.set_throttle(self.address, throttle)
    }

    /// Change direction; ignored while moving.
    pub fn set_direction(&self, direction: Direction) -> Result<DirectionChange> {
        self.registry.set_direction(self.address, direction)
    }

    /// Replace the ramp intervals.
    pub fn set_ramp_profile(&self, profile: RampProfile) -> Result<()> {
        self.registry.set_ramp_profile(self.address, profile)
    }

    /// Current snapshot.
    pub fn status(&self) -> Result<ChannelStatus> {
        self.registry.status(self.address)
    }
}
