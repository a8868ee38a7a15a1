//! Word-level access to the memory a peripheral streams from.
//!
//! The transmission buffer never touches memory directly; it goes through
//! [`RegisterAccess`], which is backed by plain RAM on the desktop
//! ([`crate::hal::HeapMemory`]), by a recording double in tests
//! ([`crate::hal::MockMemory`]), or by a mapped DMA region on hardware.
//!
//! # Example
//!
//! ```rust
//! use dcc_station::hal::HeapMemory;
//! use dcc_station::traits::RegisterAccess;
//!
//! let memory = HeapMemory::new(64);
//! memory.poke(8, 0xDEAD_BEEF).unwrap();
//! assert_eq!(memory.peek(8).unwrap(), 0xDEAD_BEEF);
//!
//! // Words are little-endian in memory
//! assert_eq!(memory.peek_byte(8).unwrap(), 0xEF);
//!
//! // Offsets must be word aligned
//! assert!(memory.peek(6).is_err());
//! ```

use crate::error::{DccError, Result};

/// Bytes per word.
pub const WORD_BYTES: usize = 4;

/// Peek/poke capability over a byte region accessed as 32-bit words.
///
/// Offsets are in bytes and must be multiples of [`WORD_BYTES`]. Words are
/// stored little-endian.
///
/// # Implementation Notes
///
/// - Each word access must be indivisible: a concurrent reader sees the old
///   or the new word, never a mix.
/// - Implementations are shared across threads, hence `&self` methods.
pub trait RegisterAccess: Send + Sync {
    /// Size of the region in bytes.
    fn len(&self) -> usize;

    /// Read the word at `offset`.
    fn peek(&self, offset: usize) -> Result<u32>;

    /// Write the word at `offset`.
    fn poke(&self, offset: usize, value: u32) -> Result<()>;

    /// True if the region has no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one byte by peeking its containing word.
    fn peek_byte(&self, offset: usize) -> Result<u8> {
        let word = self.peek(offset - offset % WORD_BYTES)?;
        Ok(word.to_le_bytes()[offset % WORD_BYTES])
    }
}

/// Validate a word offset against a region of `len` bytes.
///
/// Returns the word index on success.
pub fn check_word_offset(offset: usize, len: usize) -> Result<usize> {
    if offset % WORD_BYTES != 0 {
        return Err(DccError::UnalignedAccess { offset });
    }
    if offset.checked_add(WORD_BYTES).map_or(true, |end| end > len) {
        return Err(DccError::OutOfBounds { offset, len });
    }
    Ok(offset / WORD_BYTES)
}
