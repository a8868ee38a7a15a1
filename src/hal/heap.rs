//! RAM-backed [`RegisterAccess`] implementation.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::Result;
use crate::traits::{check_word_offset, RegisterAccess, WORD_BYTES};

/// Plain memory stored as atomic words.
///
/// Stands in for the DMA region on machines without the peripheral, and is
/// what the station binary transmits from. Word accesses are atomic, so a
/// reader on another thread never observes a torn word.
#[derive(Debug)]
pub struct HeapMemory {
    words: Box<[AtomicU32]>,
}

impl HeapMemory {
    /// Allocate `len` bytes of zeroed memory, rounded up to whole words.
    pub fn new(len: usize) -> Self {
        let words = len.div_ceil(WORD_BYTES);
        Self {
            words: (0..words).map(|_| AtomicU32::new(0)).collect(),
        }
    }
}

impl RegisterAccess for HeapMemory {
    fn len(&self) -> usize {
        self.words.len() * WORD_BYTES
    }

    fn peek(&self, offset: usize) -> Result<u32> {
        let index = check_word_offset(offset, self.len())?;
        Ok(self.words[index].load(Ordering::Relaxed))
    }

    fn poke(&self, offset: usize, value: u32) -> Result<()> {
        let index = check_word_offset(offset, self.len())?;
        self.words[index].store(value, Ordering::Relaxed);
        Ok(())
    }
}
