//! Logical locomotive instructions and direction of travel.
//!
//! An [`Instruction`] is what a channel wants the track to carry. It is
//! turned into a framed, modulated signal by [`crate::codec`] and written
//! into the channel's slot by [`crate::buffer::TransmissionBuffer`].
//!
//! # Example
//!
//! ```rust
//! use dcc_station::{Direction, Instruction};
//!
//! let instruction = Instruction::speed(3, Direction::Forward, 14).unwrap();
//! assert_eq!(instruction.address(), Some(3));
//!
//! // Speeds above 28 are rejected, never clamped
//! assert!(Instruction::speed(3, Direction::Forward, 29).is_err());
//! ```

use crate::error::{DccError, Result};

/// Highest speed step in 28-step mode.
pub const MAX_SPEED: u8 = 28;

/// Highest short (7-bit) locomotive address.
pub const MAX_SHORT_ADDRESS: u8 = 127;

/// Direction of travel as carried in a SPEED instruction.
///
/// # Default
///
/// Defaults to [`Forward`](Self::Forward), the direction every channel is
/// initialised with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Locomotive runs forwards (bit 6 of the data byte set).
    #[default]
    Forward,
    /// Locomotive runs backwards.
    Reverse,
}

impl Direction {
    /// Build from the `forwards` flag of a SPEED instruction.
    #[inline]
    pub const fn from_forwards(forwards: bool) -> Self {
        if forwards {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// True for [`Direction::Forward`].
    #[inline]
    pub const fn is_forward(&self) -> bool {
        matches!(self, Direction::Forward)
    }

    /// `+1` for forward, `-1` for reverse.
    #[inline]
    pub const fn sign(&self) -> i8 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    /// The opposite direction.
    #[inline]
    pub const fn reversed(&self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// Returns the direction as a lowercase string.
    ///
    /// ```
    /// use dcc_station::Direction;
    ///
    /// assert_eq!(Direction::Forward.as_str(), "forward");
    /// assert_eq!(Direction::Reverse.as_str(), "reverse");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }

    /// Parse direction from text input.
    ///
    /// Accepts `"forward"`, `"fwd"`, `"1"` and `"reverse"`, `"rev"`,
    /// `"backward"`, `"-1"`. Input is trimmed and case-insensitive.
    ///
    /// ```
    /// use dcc_station::Direction;
    ///
    /// assert_eq!(Direction::from_text(" FWD "), Some(Direction::Forward));
    /// assert_eq!(Direction::from_text("-1"), Some(Direction::Reverse));
    /// assert_eq!(Direction::from_text("0"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        let s = s.trim();
        let matches_any = |options: &[&str]| options.iter().any(|o| s.eq_ignore_ascii_case(o));
        if matches_any(&["forward", "fwd", "1"]) {
            Some(Direction::Forward)
        } else if matches_any(&["reverse", "rev", "backward", "-1"]) {
            Some(Direction::Reverse)
        } else {
            None
        }
    }
}

/// A single instruction carried on the track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum Instruction {
    /// Idle packet; keeps the line live when nothing needs updating.
    Idle,
    /// Broadcast stop, optionally an emergency stop.
    Stop {
        /// Emergency stop (cut power to the motor) rather than normal stop.
        emergency: bool,
    },
    /// 28-step speed and direction for one locomotive.
    Speed {
        /// Short locomotive address, `1..=127`.
        address: u8,
        /// Direction of travel.
        direction: Direction,
        /// Speed step, `0..=28`.
        speed: u8,
    },
}

impl Instruction {
    /// Build a validated SPEED instruction.
    pub fn speed(address: u8, direction: Direction, speed: u8) -> Result<Self> {
        check_speed(speed)?;
        check_address(address)?;
        Ok(Instruction::Speed {
            address,
            direction,
            speed,
        })
    }

    /// Locomotive address for SPEED instructions, `None` otherwise.
    pub const fn address(&self) -> Option<u8> {
        match self {
            Instruction::Speed { address, .. } => Some(*address),
            _ => None,
        }
    }

    /// True for SPEED instructions.
    pub const fn is_speed(&self) -> bool {
        matches!(self, Instruction::Speed { .. })
    }
}

/// Reject speeds outside `0..=28`.
pub(crate) fn check_speed(speed: u8) -> Result<()> {
    if speed > MAX_SPEED {
        return Err(DccError::InvalidInstruction("speed must be in 0..=28"));
    }
    Ok(())
}

/// Reject the broadcast address and anything beyond the short address range.
pub(crate) fn check_address(address: u8) -> Result<()> {
    if address == 0 {
        return Err(DccError::InvalidInstruction("address 0 is broadcast only"));
    }
    if address > MAX_SHORT_ADDRESS {
        return Err(DccError::InvalidInstruction(
            "address must be a short address (1..=127)",
        ));
    }
    Ok(())
}
