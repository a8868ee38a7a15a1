//! Stream layer: packet bytes framed with preamble, start bits and end bit.
//!
//! ```text
//! 1111111111111 0 AAAAAAAA 0 DDDDDDDD 0 CCCCCCCC 1
//! preamble      ^ address  ^ data     ^ checksum ^ end bit
//!               start bits
//! ```

use bitvec::prelude::*;

use super::packet::{Packet, MAX_PACKET_BYTES};
use super::Bits;
use crate::error::{DccError, Result};

/// Preamble length written by the encoder.
pub const PREAMBLE_BITS: usize = 13;

/// A stream is accepted when its leading run of ones exceeds 12 bits.
const MIN_PREAMBLE_BITS: usize = 13;

/// Bits per framed byte: start bit plus eight data bits.
const FRAMED_BYTE_BITS: usize = 9;

/// Expand a byte into eight bits, most significant first.
pub fn unpack_byte_to_bits(byte: u8) -> Bits {
    byte.view_bits::<Msb0>().to_bitvec()
}

/// Expand bytes into bits, most significant bit of each byte first.
pub fn unpack_bytes_to_bits(bytes: &[u8]) -> Bits {
    Bits::from_slice(bytes)
}

/// Fold up to eight bits, most significant first, into a right-aligned byte.
pub(crate) fn bits_to_byte(bits: &BitSlice<u8, Msb0>) -> u8 {
    bits.iter()
        .by_vals()
        .fold(0, |acc, bit| (acc << 1) | u8::from(bit))
}

/// Frame a packet: preamble, then `0` + byte for each byte, then a final `1`.
pub fn packet_to_stream(packet: &Packet) -> Bits {
    let mut stream =
        Bits::with_capacity(PREAMBLE_BITS + packet.len() * FRAMED_BYTE_BITS + 1);
    stream.resize(PREAMBLE_BITS, true);

    for byte in packet.as_bytes() {
        stream.push(false); // start bit
        stream.extend_from_bitslice(byte.view_bits::<Msb0>());
    }

    stream.push(true); // end bit
    stream
}

/// Recover the packet from a framed stream and verify its checksum.
///
/// Anything after the end bit (alignment padding) is ignored.
pub fn decode_stream(stream: &BitSlice<u8, Msb0>) -> Result<Packet> {
    let preamble = stream.leading_ones();
    if preamble < MIN_PREAMBLE_BITS {
        return Err(DccError::MalformedStream("preamble too short"));
    }

    let mut rest = &stream[preamble..];
    let mut bytes = heapless::Vec::<u8, MAX_PACKET_BYTES>::new();
    while let Some(start_bit) = rest.first().map(|bit| *bit) {
        if start_bit {
            break; // end bit
        }
        if rest.len() < FRAMED_BYTE_BITS {
            return Err(DccError::MalformedStream("truncated data byte"));
        }
        bytes
            .push(bits_to_byte(&rest[1..FRAMED_BYTE_BITS]))
            .map_err(|_| DccError::MalformedStream("packet too long"))?;
        rest = &rest[FRAMED_BYTE_BITS..];
    }

    Packet::from_bytes(&bytes)
}
