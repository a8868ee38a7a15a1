//! Packet layer: instruction bytes plus XOR checksum.
//!
//! A packet is `[address, data, checksum]` where the checksum is the
//! XOR-fold of every preceding byte. The encoders here build packets for the
//! three instruction shapes; [`decode_instruction`] classifies a packet back
//! into an [`Instruction`].

use core::ops::Deref;

use crate::error::{DccError, Result};
use crate::instruction::{check_address, check_speed, Direction, Instruction, MAX_SHORT_ADDRESS};

/// Longest packet the baseline protocol allows (address, 4 data bytes, checksum).
pub const MAX_PACKET_BYTES: usize = 6;

/// Speed codes 1 and 2 are reserved for (emergency) stop.
const SPEED_BIAS: u8 = 3;

const IDLE_ADDRESS: u8 = 0xFF;
const BROADCAST_ADDRESS: u8 = 0x00;

/// Base of every SPEED data byte: `01DCSSSS` with D/C/S filled in.
const SPEED_BASE: u8 = 0x20;
const SPEED_MASK: u8 = 0xA0;
const FORWARD_BIT: u8 = 0x40;

const STOP_BASE: u8 = 0x50;
const STOP_MASK: u8 = 0xF0;

type PacketBytes = heapless::Vec<u8, MAX_PACKET_BYTES>;

const _: () = assert!(MAX_PACKET_BYTES >= 3);

/// A checksummed packet of between two and [`MAX_PACKET_BYTES`] bytes.
///
/// The last byte is always the XOR-fold of the others; constructors enforce it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    bytes: PacketBytes,
}

impl Packet {
    /// Append the checksum to `payload`.
    pub fn with_checksum(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Err(DccError::InvalidInstruction("packet payload is empty"));
        }
        let too_long = DccError::InvalidInstruction("packet payload too long");
        let mut bytes = PacketBytes::new();
        bytes.extend_from_slice(payload).map_err(|()| too_long)?;
        bytes.push(checksum(payload)).map_err(|_| too_long)?;
        Ok(Self { bytes })
    }

    /// Wrap bytes that already end in a checksum, verifying it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (found, payload) = match bytes.split_last() {
            Some((last, payload)) if !payload.is_empty() => (*last, payload),
            _ => return Err(DccError::MalformedStream("packet shorter than two bytes")),
        };
        let expected = checksum(payload);
        if expected != found {
            return Err(DccError::ChecksumMismatch { expected, found });
        }
        let bytes = PacketBytes::from_slice(bytes)
            .map_err(|()| DccError::MalformedStream("packet too long"))?;
        Ok(Self { bytes })
    }

    /// Infallible constructor for the fixed two-byte instructions.
    fn pair(address: u8, data: u8) -> Self {
        match PacketBytes::from_slice(&[address, data, address ^ data]) {
            Ok(bytes) => Self { bytes },
            Err(()) => unreachable!("MAX_PACKET_BYTES holds a two-byte packet"),
        }
    }

    /// All bytes including the checksum.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes covered by the checksum.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    /// The trailing checksum byte.
    #[inline]
    pub fn checksum_byte(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }
}

impl Deref for Packet {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// XOR-fold of `bytes`; zero for an empty slice.
///
/// ```
/// use dcc_station::codec::checksum;
///
/// assert_eq!(checksum(&[1, 2, 2, 4, 8, 8]), 5);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

/// Append the XOR-fold of `bytes`; alias for [`Packet::with_checksum`].
pub fn with_checksum(bytes: &[u8]) -> Result<Packet> {
    Packet::with_checksum(bytes)
}

/// Build a 28-step SPEED packet.
///
/// Non-zero speeds are biased by 3 to step over the stop codes, then split
/// into the low bit (data bit 4) and the high part (data bits 0-3).
pub fn encode_speed(address: u8, direction: Direction, speed: u8) -> Result<Packet> {
    check_speed(speed)?;
    check_address(address)?;

    let biased = if speed == 0 { 0 } else { speed + SPEED_BIAS };
    let mut data = SPEED_BASE;
    if direction.is_forward() {
        data |= FORWARD_BIT;
    }
    data |= (biased & 1) << 4;
    data |= biased >> 1;

    Ok(Packet::pair(address, data))
}

/// The idle packet `[0xFF, 0x00, 0xFF]`.
pub fn encode_idle() -> Packet {
    Packet::pair(IDLE_ADDRESS, 0x00)
}

/// Broadcast stop `[0x00, 0x50 | emergency, checksum]`.
pub fn encode_stop(emergency: bool) -> Packet {
    Packet::pair(BROADCAST_ADDRESS, STOP_BASE | u8::from(emergency))
}

/// Encode any instruction into its packet.
pub fn encode_instruction(instruction: &Instruction) -> Result<Packet> {
    match *instruction {
        Instruction::Idle => Ok(encode_idle()),
        Instruction::Stop { emergency } => Ok(encode_stop(emergency)),
        Instruction::Speed {
            address,
            direction,
            speed,
        } => encode_speed(address, direction, speed),
    }
}

/// Classify a packet as one of the known instruction shapes.
pub fn decode_instruction(packet: &Packet) -> Result<Instruction> {
    match *packet.payload() {
        [IDLE_ADDRESS, 0x00] => Ok(Instruction::Idle),
        [BROADCAST_ADDRESS, data] if data & STOP_MASK == STOP_BASE => Ok(Instruction::Stop {
            emergency: data & 1 == 1,
        }),
        [address, data]
            if data & SPEED_MASK == SPEED_BASE && (1..=MAX_SHORT_ADDRESS).contains(&address) =>
        {
            let raw = ((data & 0x0F) << 1) | ((data >> 4) & 1);
            let speed = match raw {
                0 => 0,
                r if r >= SPEED_BIAS => r - SPEED_BIAS,
                _ => return Err(DccError::UndecodableInstruction { address, data }),
            };
            Ok(Instruction::Speed {
                address,
                direction: Direction::from_forwards(data & FORWARD_BIT != 0),
                speed,
            })
        }
        [address, data, ..] => Err(DccError::UndecodableInstruction { address, data }),
        [address] => Err(DccError::UndecodableInstruction { address, data: 0 }),
        [] => Err(DccError::MalformedStream("packet has no payload")),
    }
}
