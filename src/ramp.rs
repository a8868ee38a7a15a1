//! Speed ramps: stepping each channel's transmitted speed toward its throttle.
//!
//! Every address has a [`ChannelState`] guarded by its own mutex and a
//! periodic [`RampTask`]. A tick moves the transmitted speed one step toward
//! the throttle and pauses itself once they agree, so idle channels cost
//! nothing. `set_throttle` wakes the task only when the ramp has to start
//! moving or change between accelerating and braking.
//!
//! ```text
//! set_throttle(20)         tick      tick            tick
//!   speed 0 ─────────────▶ 1 ──────▶ 2 ─── ... ───▶ 20  (pause)
//! ```

use core::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::buffer::TransmissionBuffer;
use crate::config::RampConfig;
use crate::error::{DccError, Result};
use crate::instruction::{check_speed, Direction, Instruction};
use crate::registry::ChannelStatus;
use crate::traits::{PeriodicTask, RegisterAccess, TaskHandle};

// ============================================================================
// Ramp Profile
// ============================================================================

/// Tick intervals for one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RampProfile {
    /// Interval between steps while the speed rises
    pub accelerate: Duration,
    /// Interval between steps while the speed falls
    pub brake: Duration,
}

impl Default for RampProfile {
    fn default() -> Self {
        Self::from_config(&RampConfig::default())
    }
}

impl RampProfile {
    /// Profile from the configured intervals.
    pub fn from_config(config: &RampConfig) -> Self {
        Self {
            accelerate: config.accelerate(),
            brake: config.brake(),
        }
    }

    /// Same interval both ways.
    pub fn uniform(interval: Duration) -> Self {
        Self {
            accelerate: interval,
            brake: interval,
        }
    }

    /// Interval for a ramp that must move the speed by `adjustment`.
    pub fn interval_for(&self, adjustment: i16) -> Duration {
        if adjustment < 0 {
            self.brake
        } else {
            self.accelerate
        }
    }
}

/// Outcome of a direction request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectionChange {
    /// The slot now transmits the requested direction.
    Applied,
    /// The channel is moving; nothing was written.
    Ignored,
}

// ============================================================================
// Channel State
// ============================================================================

/// Mutable state of one address.
///
/// The transmitted speed and direction are not stored here; they live in the
/// buffer slot and are read back on demand.
#[derive(Debug)]
pub struct ChannelState<H> {
    throttle: u8,
    profile: RampProfile,
    ramp: Option<H>,
}

impl<H: TaskHandle> ChannelState<H> {
    fn new(profile: RampProfile) -> Self {
        Self {
            throttle: 0,
            profile,
            ramp: None,
        }
    }

    /// Requested speed.
    pub fn throttle(&self) -> u8 {
        self.throttle
    }

    /// Intervals used by this channel's ramp.
    pub fn profile(&self) -> RampProfile {
        self.profile
    }

    /// True while the ramp task is ticking.
    pub fn is_ramping(&self) -> bool {
        self.ramp.as_ref().is_some_and(|ramp| !ramp.is_paused())
    }

    fn pause(&self) {
        if let Some(ramp) = &self.ramp {
            ramp.pause();
        }
    }
}

// ============================================================================
// Channel Table
// ============================================================================

/// The transmission buffer plus one locked [`ChannelState`] per address.
///
/// Shared between the control side and every [`RampTask`]. Each operation
/// holds the address's lock for its whole read-modify-write, so a tick and a
/// throttle change on the same address never interleave while different
/// addresses proceed independently.
pub struct ChannelTable<M, H> {
    buffer: TransmissionBuffer<M>,
    channels: Vec<Mutex<ChannelState<H>>>,
}

impl<M: RegisterAccess, H: TaskHandle> ChannelTable<M, H> {
    /// Table with one idle channel per drivable address of `buffer`.
    pub fn new(buffer: TransmissionBuffer<M>, profile: RampProfile) -> Self {
        let channels = (0..buffer.max_addr())
            .map(|_| Mutex::new(ChannelState::new(profile)))
            .collect();
        Self { buffer, channels }
    }

    /// Give `address` the handle of its scheduled ramp task.
    pub(crate) fn attach(&self, address: u8, handle: H) -> Result<()> {
        self.lock(address)?.ramp = Some(handle);
        Ok(())
    }

    /// The shared transmission buffer.
    pub fn buffer(&self) -> &TransmissionBuffer<M> {
        &self.buffer
    }

    /// Highest drivable address.
    pub fn max_addr(&self) -> u8 {
        self.buffer.max_addr()
    }

    /// Request a new target speed for `address`.
    ///
    /// The ramp is rescheduled and resumed only when it has to start moving
    /// or reverse between accelerating and braking; a ramp already heading
    /// the right way keeps its cadence.
    pub fn set_throttle(&self, address: u8, throttle: u8) -> Result<()> {
        check_speed(throttle)?;
        let mut channel = self.lock(address)?;
        let (_, speed) = self.buffer.peek_instruction(address)?;

        let required = i16::from(throttle) - i16::from(speed);
        let current = i16::from(channel.throttle) - i16::from(speed);

        if required != 0 {
            if let Some(ramp) = &channel.ramp {
                if required * current > 0 && !ramp.is_paused() {
                    trace!(address, throttle, "ramp already heading to throttle");
                } else {
                    let interval = channel.profile.interval_for(required);
                    ramp.reschedule(interval);
                    ramp.resume();
                    debug!(address, throttle, speed, ?interval, "ramp started");
                }
            }
        }

        channel.throttle = throttle;
        Ok(())
    }

    /// One ramp step for `address`.
    ///
    /// Moves the transmitted speed one unit toward the throttle, keeping the
    /// transmitted direction, and pauses the ramp once they match.
    pub fn tick(&self, address: u8) -> Result<()> {
        let channel = self.lock(address)?;
        let (direction, speed) = self.buffer.peek_instruction(address)?;
        let target = channel.throttle;

        let next = match target.cmp(&speed) {
            Ordering::Greater => speed + 1,
            Ordering::Less => speed - 1,
            Ordering::Equal => speed,
        };
        if next != speed {
            self.buffer
                .poke_instruction(address, &Instruction::speed(address, direction, next)?)?;
            trace!(address, speed = next, target, "ramp step");
        }

        if next == target {
            channel.pause();
            debug!(address, speed = next, "throttle reached");
        }
        Ok(())
    }

    /// Change the transmitted direction of a stationary channel.
    ///
    /// A moving channel keeps its direction and the request is ignored.
    pub fn set_direction(&self, address: u8, direction: Direction) -> Result<DirectionChange> {
        let _channel = self.lock(address)?;
        let (current, speed) = self.buffer.peek_instruction(address)?;
        if speed != 0 {
            debug!(
                address,
                speed,
                requested = direction.as_str(),
                "direction change ignored while moving"
            );
            return Ok(DirectionChange::Ignored);
        }
        if current != direction {
            self.buffer
                .poke_instruction(address, &Instruction::speed(address, direction, 0)?)?;
            debug!(address, direction = direction.as_str(), "direction changed");
        }
        Ok(DirectionChange::Applied)
    }

    /// Zero the throttle and transmitted speed at once and pause the ramp.
    ///
    /// Direction is kept.
    pub fn halt(&self, address: u8) -> Result<()> {
        let mut channel = self.lock(address)?;
        channel.pause();
        channel.throttle = 0;
        let (direction, _) = self.buffer.peek_instruction(address)?;
        self.buffer
            .poke_instruction(address, &Instruction::speed(address, direction, 0)?)
    }

    /// Pause `address`'s ramp without touching its throttle.
    pub fn pause(&self, address: u8) -> Result<()> {
        self.lock(address)?.pause();
        Ok(())
    }

    /// Replace `address`'s ramp intervals.
    ///
    /// A running ramp picks up the new interval for its current direction.
    pub fn set_profile(&self, address: u8, profile: RampProfile) -> Result<()> {
        let mut channel = self.lock(address)?;
        channel.profile = profile;
        if let Some(ramp) = channel.ramp.as_ref().filter(|ramp| !ramp.is_paused()) {
            let (_, speed) = self.buffer.peek_instruction(address)?;
            let required = i16::from(channel.throttle) - i16::from(speed);
            ramp.reschedule(profile.interval_for(required));
        }
        Ok(())
    }

    /// Snapshot of `address`.
    pub fn status(&self, address: u8) -> Result<ChannelStatus> {
        let channel = self.lock(address)?;
        let (direction, speed) = self.buffer.peek_instruction(address)?;
        Ok(ChannelStatus {
            address,
            throttle: channel.throttle,
            speed,
            direction,
            ramping: channel.is_ramping(),
        })
    }

    fn lock(&self, address: u8) -> Result<MutexGuard<'_, ChannelState<H>>> {
        let index = usize::from(address)
            .checked_sub(1)
            .filter(|index| *index < self.channels.len())
            .ok_or(DccError::AddressOutOfRange {
                address,
                max: self.max_addr(),
            })?;
        Ok(self.channels[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }
}

// ============================================================================
// Ramp Task
// ============================================================================

/// Periodic task stepping one address toward its throttle.
pub struct RampTask<M, H> {
    address: u8,
    table: Arc<ChannelTable<M, H>>,
}

impl<M, H> RampTask<M, H> {
    /// Task for `address` over `table`.
    pub fn new(address: u8, table: Arc<ChannelTable<M, H>>) -> Self {
        Self { address, table }
    }

    /// Address this task drives.
    pub fn address(&self) -> u8 {
        self.address
    }
}

impl<M, H> PeriodicTask for RampTask<M, H>
where
    M: RegisterAccess + 'static,
    H: TaskHandle + 'static,
{
    fn run(&self) {
        if let Err(e) = self.table.tick(self.address) {
            error!(address = self.address, error = %e, "ramp tick failed, pausing");
            if let Err(e) = self.table.pause(self.address) {
                warn!(address = self.address, error = %e, "failed to pause ramp");
            }
        }
    }
}
