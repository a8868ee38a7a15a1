//! The transmission buffer: one fixed-width slot per track address.
//!
//! A peripheral streams the data region out continuously, so writing a slot
//! is how software changes what is on the track. There is no handshake; the
//! next pass of the DMA engine picks up the new content.
//!
//! # Memory Map
//!
//! ```text
//! 0                 header_bytes                          memory_bytes
//! | control block   | slot 0 | slot 1 | ... | slot max | pad |
//! ```
//!
//! Slot 0 carries broadcast packets (Idle, Stop). Slots `1..=max_addr`
//! carry the SPEED packet for their address.

use alloc::vec::Vec;

use tracing::{info, trace};

use crate::codec::{decode_from_bytes, encode_to_bytes, max_speed_signal_bytes};
use crate::config::{Config, DmaConfig, LayoutConfig};
use crate::error::{DccError, Result};
use crate::instruction::{Direction, Instruction};
use crate::traits::{RegisterAccess, WORD_BYTES};

/// Words in a DMA control block.
pub const CONTROL_BLOCK_WORDS: usize = 8;

/// Index of the `next` pointer within the control block.
const NEXT_BLOCK_WORD: usize = 5;

// ============================================================================
// Control Block
// ============================================================================

/// DMA control block stored at the start of the buffer.
///
/// Word order: `[transfer_info, source, destination, length, stride, next, 0, 0]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlBlock {
    /// Transfer information (pacing, increment flags)
    pub transfer_info: u32,
    /// Source bus address
    pub source: u32,
    /// Destination bus address
    pub destination: u32,
    /// Bytes to transfer
    pub length: u32,
    /// 2D stride, unused
    pub stride: u32,
    /// Bus address of the next control block, 0 to stop
    pub next: u32,
}

impl ControlBlock {
    /// Block for a data region of `length` bytes.
    pub fn new(dma: &DmaConfig, length: u32) -> Self {
        Self {
            transfer_info: dma.transfer_info,
            source: dma.source,
            destination: dma.destination,
            length,
            stride: 0,
            next: 0,
        }
    }

    /// Words as laid out in memory.
    pub fn to_words(&self) -> [u32; CONTROL_BLOCK_WORDS] {
        [
            self.transfer_info,
            self.source,
            self.destination,
            self.length,
            self.stride,
            self.next,
            0,
            0,
        ]
    }

    /// Rebuild from words read out of memory.
    pub fn from_words(words: &[u32; CONTROL_BLOCK_WORDS]) -> Self {
        Self {
            transfer_info: words[0],
            source: words[1],
            destination: words[2],
            length: words[3],
            stride: words[4],
            next: words[NEXT_BLOCK_WORD],
        }
    }
}

// ============================================================================
// Transmission Buffer
// ============================================================================

/// Slot-addressed view over the memory a DMA peripheral transmits.
///
/// # Example
///
/// ```rust
/// use dcc_station::buffer::TransmissionBuffer;
/// use dcc_station::hal::HeapMemory;
/// use dcc_station::{Config, Direction, Instruction};
///
/// let config = Config::default();
/// let memory = HeapMemory::new(config.layout.memory_bytes());
/// let buffer = TransmissionBuffer::from_config(memory, &config).unwrap();
/// buffer.initialise_slots().unwrap();
///
/// let instruction = Instruction::speed(7, Direction::Reverse, 9).unwrap();
/// buffer.poke_instruction(7, &instruction).unwrap();
/// assert_eq!(buffer.peek_instruction(7).unwrap(), (Direction::Reverse, 9));
/// assert_eq!(buffer.read_instruction(0).unwrap(), Instruction::Idle);
/// ```
#[derive(Debug)]
pub struct TransmissionBuffer<M> {
    memory: M,
    layout: LayoutConfig,
}

impl<M: RegisterAccess> TransmissionBuffer<M> {
    /// Wrap `memory`, validating the layout and writing the control block.
    ///
    /// Fails with [`DccError::SlotOverflow`] if any legal instruction for
    /// this layout would not fit its slot, so later writes never need to
    /// truncate. Slots are left untouched; see
    /// [`initialise_slots`](Self::initialise_slots).
    pub fn new(memory: M, layout: LayoutConfig, dma: &DmaConfig) -> Result<Self> {
        layout.validate()?;
        if memory.len() < layout.memory_bytes() {
            return Err(DccError::InvalidLayout("memory smaller than the layout"));
        }

        let widest = [
            max_speed_signal_bytes(layout.max_addr, layout.alignment_bits)?,
            encode_to_bytes(&Instruction::Idle, layout.alignment_bits)?.len(),
            encode_to_bytes(&Instruction::Stop { emergency: true }, layout.alignment_bits)?.len(),
            encode_to_bytes(&Instruction::Stop { emergency: false }, layout.alignment_bits)?.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        if widest > layout.bytes_per_channel {
            return Err(DccError::SlotOverflow {
                required: widest,
                available: layout.bytes_per_channel,
            });
        }

        let buffer = Self { memory, layout };
        let data_len = u32::try_from(buffer.layout.data_bytes())
            .map_err(|_| DccError::InvalidLayout("data region exceeds 32-bit length"))?;
        buffer.write_control_block(&ControlBlock::new(dma, data_len))?;

        info!(
            max_addr = buffer.layout.max_addr,
            bytes_per_channel = buffer.layout.bytes_per_channel,
            widest_signal = widest,
            "transmission buffer ready"
        );
        Ok(buffer)
    }

    /// Wrap `memory` using the layout and DMA sections of `config`.
    pub fn from_config(memory: M, config: &Config) -> Result<Self> {
        Self::new(memory, config.layout.clone(), &config.dma)
    }

    /// Put every slot into its startup state.
    ///
    /// Slot 0 transmits Idle; every drivable slot transmits SPEED 0 forward.
    pub fn initialise_slots(&self) -> Result<()> {
        self.poke_instruction(0, &Instruction::Idle)?;
        for address in 1..=self.layout.max_addr {
            self.poke_instruction(address, &Instruction::speed(address, Direction::Forward, 0)?)?;
        }
        Ok(())
    }

    /// Encode `instruction` and write it into `address`'s slot.
    ///
    /// The rest of the slot is zero filled so no stale tail is transmitted.
    /// A SPEED instruction must target the slot's own address.
    pub fn poke_instruction(&self, address: u8, instruction: &Instruction) -> Result<()> {
        let offset = self.slot_offset(address)?;
        if let Some(target) = instruction.address() {
            if target != address {
                return Err(DccError::InvalidInstruction(
                    "speed instruction written to another address's slot",
                ));
            }
        }

        let mut bytes = encode_to_bytes(instruction, self.layout.alignment_bits)?;
        let available = self.layout.bytes_per_channel;
        if bytes.len() > available {
            return Err(DccError::SlotOverflow {
                required: bytes.len(),
                available,
            });
        }
        bytes.resize(available, 0);

        for (index, word) in bytes.chunks_exact(WORD_BYTES).enumerate() {
            let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            self.memory.poke(offset + index * WORD_BYTES, value)?;
        }
        trace!(address, ?instruction, "slot written");
        Ok(())
    }

    /// Direction and speed of the SPEED instruction in `address`'s slot.
    ///
    /// Any other instruction in the slot is [`DccError::UnexpectedInstruction`].
    pub fn peek_instruction(&self, address: u8) -> Result<(Direction, u8)> {
        match self.read_instruction(address)? {
            Instruction::Speed {
                address: found,
                direction,
                speed,
            } if found == address => Ok((direction, speed)),
            found => Err(DccError::UnexpectedInstruction { address, found }),
        }
    }

    /// Decode whatever instruction `address`'s slot holds.
    pub fn read_instruction(&self, address: u8) -> Result<Instruction> {
        decode_from_bytes(&self.read_slot(address)?)
    }

    /// Raw bytes of `address`'s slot.
    pub fn read_slot(&self, address: u8) -> Result<Vec<u8>> {
        let offset = self.slot_offset(address)?;
        let mut bytes = Vec::with_capacity(self.layout.bytes_per_channel);
        for word in (0..self.layout.bytes_per_channel).step_by(WORD_BYTES) {
            bytes.extend_from_slice(&self.memory.peek(offset + word)?.to_le_bytes());
        }
        Ok(bytes)
    }

    /// Read a single byte anywhere in the buffer.
    pub fn peek_byte(&self, offset: usize) -> Result<u8> {
        self.memory.peek_byte(offset)
    }

    /// The control block currently in memory.
    pub fn control_block(&self) -> Result<ControlBlock> {
        let mut words = [0u32; CONTROL_BLOCK_WORDS];
        for (index, word) in words.iter_mut().enumerate() {
            *word = self.memory.peek(index * WORD_BYTES)?;
        }
        Ok(ControlBlock::from_words(&words))
    }

    /// Chain another control block after this one (0 ends the chain).
    pub fn set_next_block(&self, bus_address: u32) -> Result<()> {
        self.memory.poke(NEXT_BLOCK_WORD * WORD_BYTES, bus_address)
    }

    /// Layout the buffer was built with.
    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Highest drivable address.
    pub fn max_addr(&self) -> u8 {
        self.layout.max_addr
    }

    /// Underlying memory.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    fn write_control_block(&self, block: &ControlBlock) -> Result<()> {
        for (index, word) in block.to_words().into_iter().enumerate() {
            self.memory.poke(index * WORD_BYTES, word)?;
        }
        Ok(())
    }

    fn slot_offset(&self, address: u8) -> Result<usize> {
        if address > self.layout.max_addr {
            return Err(DccError::AddressOutOfRange {
                address,
                max: self.layout.max_addr,
            });
        }
        Ok(self.layout.slot_offset(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::HeapMemory;

    fn buffer_for(layout: LayoutConfig) -> Result<TransmissionBuffer<HeapMemory>> {
        let memory = HeapMemory::new(layout.memory_bytes());
        TransmissionBuffer::new(memory, layout, &DmaConfig::default())
    }

    fn ready_buffer() -> TransmissionBuffer<HeapMemory> {
        let buffer = buffer_for(LayoutConfig::default()).unwrap();
        buffer.initialise_slots().unwrap();
        buffer
    }

    // =========================================================================
    // Construction Tests
    // =========================================================================

    #[test]
    fn writes_control_block() {
        let buffer = buffer_for(LayoutConfig::default()).unwrap();
        let block = buffer.control_block().unwrap();
        assert_eq!(block.transfer_info, 0x0005_0148);
        assert_eq!(block.destination, 0x7E20_C018);
        assert_eq!(block.length, 512);
        assert_eq!(block.next, 0);

        buffer.set_next_block(0xC000_0000).unwrap();
        assert_eq!(buffer.control_block().unwrap().next, 0xC000_0000);
    }

    #[test]
    fn rejects_narrow_slots() {
        let layout = LayoutConfig::default().with_bytes_per_channel(12);
        assert!(matches!(
            buffer_for(layout),
            Err(DccError::SlotOverflow {
                required: 16,
                available: 12
            })
        ));
    }

    #[test]
    fn rejects_long_addresses_in_short_slots() {
        let layout = LayoutConfig::default().with_max_addr(127);
        assert!(matches!(
            buffer_for(layout),
            Err(DccError::SlotOverflow {
                required: 20,
                available: 16
            })
        ));

        let layout = LayoutConfig::default()
            .with_max_addr(127)
            .with_bytes_per_channel(20);
        assert!(buffer_for(layout).is_ok());
    }

    #[test]
    fn rejects_small_memory() {
        let memory = HeapMemory::new(64);
        let result = TransmissionBuffer::new(memory, LayoutConfig::default(), &DmaConfig::default());
        assert!(matches!(result, Err(DccError::InvalidLayout(_))));
    }

    // =========================================================================
    // Slot Tests
    // =========================================================================

    #[test]
    fn initial_slots() {
        let buffer = ready_buffer();
        assert_eq!(buffer.read_instruction(0), Ok(Instruction::Idle));
        for address in 1..=30 {
            assert_eq!(
                buffer.peek_instruction(address),
                Ok((Direction::Forward, 0))
            );
        }
    }

    #[test]
    fn poke_then_peek() {
        let buffer = ready_buffer();
        let instruction = Instruction::speed(12, Direction::Reverse, 28).unwrap();
        buffer.poke_instruction(12, &instruction).unwrap();
        assert_eq!(buffer.peek_instruction(12), Ok((Direction::Reverse, 28)));
        // Neighbours untouched
        assert_eq!(buffer.peek_instruction(11), Ok((Direction::Forward, 0)));
        assert_eq!(buffer.peek_instruction(13), Ok((Direction::Forward, 0)));
    }

    #[test]
    fn slot_bytes_live_at_slot_offset() {
        let buffer = ready_buffer();
        let slot = buffer.read_slot(4).unwrap();
        assert_eq!(slot.len(), 16);
        let offset = buffer.layout().slot_offset(4);
        for (index, byte) in slot.iter().enumerate() {
            assert_eq!(buffer.peek_byte(offset + index), Ok(*byte));
        }
    }

    #[test]
    fn peek_rejects_broadcast_slot() {
        let buffer = ready_buffer();
        assert_eq!(
            buffer.peek_instruction(0),
            Err(DccError::UnexpectedInstruction {
                address: 0,
                found: Instruction::Idle
            })
        );
    }

    #[test]
    fn speed_for_other_address_rejected() {
        let buffer = ready_buffer();
        let instruction = Instruction::speed(5, Direction::Forward, 3).unwrap();
        assert!(matches!(
            buffer.poke_instruction(6, &instruction),
            Err(DccError::InvalidInstruction(_))
        ));
        assert_eq!(buffer.peek_instruction(6), Ok((Direction::Forward, 0)));
    }

    #[test]
    fn address_out_of_range() {
        let buffer = ready_buffer();
        assert_eq!(
            buffer.read_slot(31),
            Err(DccError::AddressOutOfRange {
                address: 31,
                max: 30
            })
        );
    }

    #[test]
    fn stop_in_broadcast_slot() {
        let buffer = ready_buffer();
        let stop = Instruction::Stop { emergency: true };
        buffer.poke_instruction(0, &stop).unwrap();
        assert_eq!(buffer.read_instruction(0), Ok(stop));
    }
}
