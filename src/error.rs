//! Error taxonomy for encoding, decoding and transmission buffer access.
//!
//! Every failure in this crate is a [`DccError`]. Encode/decode failures and
//! buffer violations are programming or data errors: they are returned to the
//! caller immediately and never clamped or truncated silently.

use crate::instruction::Instruction;

/// Convenient Result wrapper
pub type Result<T> = core::result::Result<T, DccError>;

/// Errors returned by the codec, the transmission buffer and the channel registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DccError {
    /// Address, speed or direction out of the allowed range at encode time.
    #[error("invalid instruction: {0}")]
    InvalidInstruction(&'static str),

    /// The trailing byte of a decoded packet does not match the XOR-fold of
    /// the preceding bytes.
    #[error("checksum mismatch: expected {expected:#04x}, found {found:#04x}")]
    ChecksumMismatch {
        /// Checksum computed from the packet payload.
        expected: u8,
        /// Checksum byte actually present in the packet.
        found: u8,
    },

    /// Packet bytes match none of the known instruction shapes.
    #[error("undecodable instruction: address {address:#04x}, data {data:#04x}")]
    UndecodableInstruction {
        /// First byte of the packet.
        address: u8,
        /// Second byte of the packet.
        data: u8,
    },

    /// Modulated signal is not a valid sequence of `10` / `1100` symbols.
    #[error("malformed signal: {0}")]
    MalformedSignal(&'static str),

    /// Bit stream is missing its preamble or framing bits.
    #[error("malformed stream: {0}")]
    MalformedStream(&'static str),

    /// Encoded, padded signal does not fit in a transmission slot.
    #[error("slot overflow: {required} bytes required, {available} available")]
    SlotOverflow {
        /// Bytes produced by the encoder.
        required: usize,
        /// Fixed width of a slot.
        available: usize,
    },

    /// Word access at an offset that is not 4-byte aligned.
    #[error("unaligned word access at offset {offset:#x}")]
    UnalignedAccess {
        /// Byte offset requested.
        offset: usize,
    },

    /// Access beyond the end of the backing memory.
    #[error("offset {offset:#x} out of bounds for {len} byte region")]
    OutOfBounds {
        /// Byte offset requested.
        offset: usize,
        /// Size of the backing memory in bytes.
        len: usize,
    },

    /// Channel address outside `1..=max`.
    #[error("address {address} out of range 1..={max}")]
    AddressOutOfRange {
        /// Requested address.
        address: u8,
        /// Highest drivable address.
        max: u8,
    },

    /// A slot decoded to something other than the SPEED instruction for its
    /// own address.
    #[error("slot {address} holds unexpected instruction {found:?}")]
    UnexpectedInstruction {
        /// Slot that was read.
        address: u8,
        /// Instruction found in the slot.
        found: Instruction,
    },

    /// Buffer layout or backing memory is unusable.
    #[error("invalid layout: {0}")]
    InvalidLayout(&'static str),

    /// Control request issued while the registry is not running.
    #[error("channel registry is not running")]
    NotRunning,

    /// Non-zero throttle requested while a broadcast stop is in force.
    #[error("broadcast stop active; clear it before driving")]
    StopActive,
}
