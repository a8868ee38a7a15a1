//! Signal layer: biphase modulation, alignment padding and byte packing.
//!
//! Each stream bit becomes a fixed pattern of half-period signal bits:
//!
//! | Stream bit | Signal bits |
//! |-----------|-------------|
//! | `1` | `10` (one short cycle) |
//! | `0` | `1100` (one long cycle) |
//!
//! The peripheral shifts the packed signal out at one signal bit per
//! half-period.

use alloc::vec::Vec;

use bitvec::prelude::*;

use super::stream::bits_to_byte;
use super::Bits;
use crate::error::{DccError, Result};

/// Encoded stream `1`.
const ONE_SYMBOL: [bool; 2] = [true, false];
/// Encoded stream `0`, also the padding quantum.
const ZERO_SYMBOL: [bool; 4] = [true, true, false, false];

/// Modulate a stream: `1 -> 10`, `0 -> 1100`.
pub fn stream_to_signal(stream: &BitSlice<u8, Msb0>) -> Bits {
    let ones = stream.count_ones();
    let zeros = stream.len() - ones;
    let mut signal = Bits::with_capacity(ones * ONE_SYMBOL.len() + zeros * ZERO_SYMBOL.len());

    for bit in stream.iter().by_vals() {
        if bit {
            signal.extend(ONE_SYMBOL);
        } else {
            signal.extend(ZERO_SYMBOL);
        }
    }
    signal
}

/// Demodulate a signal back into its stream.
///
/// Decoding stops at the first `00` pair found on a symbol boundary, which is
/// what an idle line or the zero-filled tail of a slot looks like.
///
/// ```
/// use dcc_station::bitvec::prelude::*;
/// use dcc_station::codec::decode_signal;
///
/// let stream = decode_signal(bits![u8, Msb0; 1, 0, 1, 0, 1, 1, 0, 0, 1, 0]).unwrap();
/// assert_eq!(stream, bits![u8, Msb0; 1, 1, 0, 1]);
/// ```
pub fn decode_signal(signal: &BitSlice<u8, Msb0>) -> Result<Bits> {
    let mut stream = Bits::with_capacity(signal.len() / ONE_SYMBOL.len());
    let mut rest = signal;

    loop {
        match rest.len() {
            0 => break,
            1 if !rest[0] => break,
            1 => return Err(DccError::MalformedSignal("truncated symbol")),
            _ => {}
        }

        match (rest[0], rest[1]) {
            (true, false) => {
                stream.push(true);
                rest = &rest[ONE_SYMBOL.len()..];
            }
            (true, true) => {
                if rest.len() < ZERO_SYMBOL.len() {
                    return Err(DccError::MalformedSignal("truncated zero symbol"));
                }
                if rest[2] || rest[3] {
                    return Err(DccError::MalformedSignal("zero symbol must end in 00"));
                }
                stream.push(false);
                rest = &rest[ZERO_SYMBOL.len()..];
            }
            (false, false) => break,
            (false, true) => {
                return Err(DccError::MalformedSignal("01 at a symbol boundary"));
            }
        }
    }

    Ok(stream)
}

/// Pad a signal to a multiple of `boundary_bits`.
///
/// Padding is whole encoded zeros, so the input must already be a whole
/// number of 4-bit quanta.
pub fn pad_to_alignment(mut signal: Bits, boundary_bits: usize) -> Result<Bits> {
    if boundary_bits == 0 || boundary_bits % ZERO_SYMBOL.len() != 0 {
        return Err(DccError::MalformedSignal(
            "alignment boundary must be a non-zero multiple of 4 bits",
        ));
    }
    if signal.len() % ZERO_SYMBOL.len() != 0 {
        return Err(DccError::MalformedSignal(
            "signal length is not a multiple of 4 bits",
        ));
    }

    while signal.len() % boundary_bits != 0 {
        signal.extend(ZERO_SYMBOL);
    }
    Ok(signal)
}

/// Pack bits into bytes, eight at a time, most significant bit first.
///
/// A trailing partial group is left-aligned and zero filled.
pub fn pack_bits_to_bytes(bits: &BitSlice<u8, Msb0>) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| bits_to_byte(chunk) << (8 - chunk.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::stream::{unpack_byte_to_bits, unpack_bytes_to_bits};

    #[test]
    fn modulation_patterns() {
        let signal = stream_to_signal(bits![u8, Msb0; 1, 0]);
        assert_eq!(signal, bits![u8, Msb0; 1, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn demodulation_inverts_modulation() {
        let stream = bits![u8, Msb0; 1, 1, 0, 1, 0, 0, 1];
        let signal = stream_to_signal(stream);
        assert_eq!(decode_signal(&signal).unwrap(), stream);
    }

    #[test]
    fn demodulation_stops_at_idle_line() {
        let signal = bits![u8, Msb0; 1, 0, 1, 1, 0, 0, 0, 0, 0, 0, 1, 0];
        assert_eq!(decode_signal(signal).unwrap(), bits![u8, Msb0; 1, 0]);
    }

    #[test]
    fn demodulation_rejects_bad_symbols() {
        assert!(matches!(
            decode_signal(bits![u8, Msb0; 1, 0, 0, 1]),
            Err(DccError::MalformedSignal(_))
        ));
        assert!(matches!(
            decode_signal(bits![u8, Msb0; 1, 1, 1, 0]),
            Err(DccError::MalformedSignal(_))
        ));
        assert!(matches!(
            decode_signal(bits![u8, Msb0; 1, 0, 1, 1]),
            Err(DccError::MalformedSignal(_))
        ));
        assert!(matches!(
            decode_signal(bits![u8, Msb0; 1, 0, 1]),
            Err(DccError::MalformedSignal(_))
        ));
    }

    #[test]
    fn padding_reaches_boundary() {
        for quanta in 0..20 {
            let signal: Bits = core::iter::repeat(ZERO_SYMBOL)
                .take(quanta)
                .flatten()
                .collect();
            let padded = pad_to_alignment(signal, 32).unwrap();
            assert_eq!(padded.len() % 32, 0);
            assert!(padded.len() >= quanta * 4);
        }
    }

    #[test]
    fn padding_rejects_half_quantum() {
        assert!(matches!(
            pad_to_alignment(bitvec![u8, Msb0; 1, 0], 32),
            Err(DccError::MalformedSignal(_))
        ));

        let signal = stream_to_signal(bits![u8, Msb0; 0, 1]);
        assert_eq!(signal.len() % 4, 2);
        assert!(matches!(
            pad_to_alignment(signal, 32),
            Err(DccError::MalformedSignal(_))
        ));
    }

    #[test]
    fn padding_leaves_aligned_signal_alone() {
        let signal: Bits = core::iter::repeat(ONE_SYMBOL).take(16).flatten().collect();
        let padded = pad_to_alignment(signal.clone(), 32).unwrap();
        assert_eq!(padded, signal);
    }

    #[test]
    fn padding_rejects_odd_lengths_and_bad_boundaries() {
        let odd = bits![u8, Msb0; 1, 0, 1].to_bitvec();
        assert!(pad_to_alignment(odd, 32).is_err());

        let quantum = bits![u8, Msb0; 1, 1, 0, 0].to_bitvec();
        assert!(pad_to_alignment(quantum.clone(), 0).is_err());
        assert!(pad_to_alignment(quantum, 30).is_err());
    }

    #[test]
    fn pack_round_trips_every_byte() {
        for n in 0..=255u8 {
            assert_eq!(pack_bits_to_bytes(&unpack_byte_to_bits(n)), [n]);
        }
    }

    #[test]
    fn pack_left_aligns_partial_group() {
        assert_eq!(pack_bits_to_bytes(bits![u8, Msb0; 1, 0, 1]), [0b1010_0000]);
        assert_eq!(
            pack_bits_to_bytes(&unpack_bytes_to_bits(&[0xDE, 0xAD])),
            [0xDE, 0xAD]
        );
        assert!(pack_bits_to_bytes(BitSlice::<u8, Msb0>::empty()).is_empty());
    }
}
