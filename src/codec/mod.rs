//! DCC codec: instruction ⇄ packet ⇄ stream ⇄ signal ⇄ bytes.
//!
//! Every stage is a pure function and each has an exact inverse:
//!
//! | Stage | Encode | Decode |
//! |-------|--------|--------|
//! | packet | [`encode_instruction`] | [`decode_instruction`] |
//! | stream | [`packet_to_stream`] | [`decode_stream`] |
//! | signal | [`stream_to_signal`] + [`pad_to_alignment`] | [`decode_signal`] |
//! | bytes | [`pack_bits_to_bytes`] | [`unpack_bytes_to_bits`] |
//!
//! [`encode_to_bytes`] and [`decode_from_bytes`] run the whole pipeline.
//!
//! # Example
//!
//! ```rust
//! use dcc_station::codec::{decode_from_bytes, encode_to_bytes, SIGNAL_ALIGNMENT_BITS};
//! use dcc_station::{Direction, Instruction};
//!
//! let instruction = Instruction::speed(3, Direction::Reverse, 12).unwrap();
//! let bytes = encode_to_bytes(&instruction, SIGNAL_ALIGNMENT_BITS).unwrap();
//! assert_eq!(bytes.len() % 4, 0);
//! assert_eq!(decode_from_bytes(&bytes).unwrap(), instruction);
//! ```

pub mod packet;
pub mod signal;
pub mod stream;

pub use packet::*;
pub use signal::*;
pub use stream::*;

use alloc::vec::Vec;

use bitvec::prelude::*;

use crate::error::Result;
use crate::instruction::{Direction, Instruction, MAX_SPEED};

/// Owned bit sequence, most significant bit of each byte first.
pub type Bits = BitVec<u8, Msb0>;

/// Padded signal length is a multiple of this many bits.
pub const SIGNAL_ALIGNMENT_BITS: usize = 32;

/// Modulated, padded signal for `instruction`.
pub fn encode_signal(instruction: &Instruction, boundary_bits: usize) -> Result<Bits> {
    let packet = encode_instruction(instruction)?;
    let stream = packet_to_stream(&packet);
    pad_to_alignment(stream_to_signal(&stream), boundary_bits)
}

/// Bytes to place in a transmission slot for `instruction`.
pub fn encode_to_bytes(instruction: &Instruction, boundary_bits: usize) -> Result<Vec<u8>> {
    encode_signal(instruction, boundary_bits).map(|signal| pack_bits_to_bytes(&signal))
}

/// Decode the instruction held in slot bytes.
pub fn decode_from_bytes(bytes: &[u8]) -> Result<Instruction> {
    let signal = unpack_bytes_to_bits(bytes);
    let stream = decode_signal(&signal)?;
    let packet = decode_stream(&stream)?;
    decode_instruction(&packet)
}

/// Longest byte encoding of any SPEED instruction for addresses `1..=max_addr`.
pub fn max_speed_signal_bytes(max_addr: u8, boundary_bits: usize) -> Result<usize> {
    let mut longest = 0;
    for address in 1..=max_addr {
        for direction in [Direction::Forward, Direction::Reverse] {
            for speed in 0..=MAX_SPEED {
                let instruction = Instruction::speed(address, direction, speed)?;
                longest = longest.max(encode_to_bytes(&instruction, boundary_bits)?.len());
            }
        }
    }
    Ok(longest)
}
