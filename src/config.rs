//! Station configuration.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use dcc_station::config::{Config, LayoutConfig, RampConfig};
//!
//! // Use defaults: 30 addresses, 16-byte slots, 200ms ramp steps
//! let config = Config::default();
//! assert_eq!(config.layout.max_addr, 30);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_layout(LayoutConfig::default().with_max_addr(10))
//!     .with_ramp(RampConfig::default().with_accelerate_ms(100));
//! ```

use core::time::Duration;

use heapless::String as HString;

use crate::error::{DccError, Result};
use crate::instruction::MAX_SHORT_ADDRESS;
use crate::traits::WORD_BYTES;

/// Maximum length for short config strings (station names)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// DMA transfers move whole 32-byte blocks.
pub const DMA_BLOCK_BYTES: usize = 32;

/// Bytes occupied by one DMA control block.
pub const CONTROL_BLOCK_BYTES: usize = 32;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= MAX_SHORT_STRING)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete station configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Transmission buffer layout
    pub layout: LayoutConfig,
    /// DMA control block settings
    pub dma: DmaConfig,
    /// Speed ramp timing
    pub ramp: RampConfig,
    /// Background scheduler settings
    pub scheduler: SchedulerConfig,
    /// Station identification
    pub station: StationConfig,
}

impl Config {
    /// Set layout configuration
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Set DMA configuration
    pub fn with_dma(mut self, dma: DmaConfig) -> Self {
        self.dma = dma;
        self
    }

    /// Set ramp configuration
    pub fn with_ramp(mut self, ramp: RampConfig) -> Self {
        self.ramp = ramp;
        self
    }

    /// Set scheduler configuration
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set station configuration
    pub fn with_station(mut self, station: StationConfig) -> Self {
        self.station = station;
        self
    }

    /// Parse a JSON config; missing sections and fields take their defaults.
    #[cfg(feature = "serde-json")]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Layout Config
// ============================================================================

/// Transmission buffer layout
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayoutConfig {
    /// Highest drivable address; slots exist for `0..=max_addr`
    pub max_addr: u8,
    /// Width of one slot in bytes (multiple of 4)
    pub bytes_per_channel: usize,
    /// Bytes reserved for the DMA control block before the data region
    pub header_bytes: usize,
    /// Padded signal length is a multiple of this many bits
    pub alignment_bits: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_addr: 30,
            bytes_per_channel: 16,
            header_bytes: CONTROL_BLOCK_BYTES,
            alignment_bits: 32,
        }
    }
}

impl LayoutConfig {
    /// Set the highest drivable address
    pub fn with_max_addr(mut self, max_addr: u8) -> Self {
        self.max_addr = max_addr;
        self
    }

    /// Set the slot width
    pub fn with_bytes_per_channel(mut self, bytes: usize) -> Self {
        self.bytes_per_channel = bytes;
        self
    }

    /// Set the signal alignment
    pub fn with_alignment_bits(mut self, bits: usize) -> Self {
        self.alignment_bits = bits;
        self
    }

    /// Check the layout is usable by the DMA peripheral.
    pub fn validate(&self) -> Result<()> {
        if self.max_addr == 0 || self.max_addr > MAX_SHORT_ADDRESS {
            return Err(DccError::InvalidLayout("max_addr must be in 1..=127"));
        }
        if self.bytes_per_channel == 0 || self.bytes_per_channel % WORD_BYTES != 0 {
            return Err(DccError::InvalidLayout(
                "bytes_per_channel must be a non-zero multiple of 4",
            ));
        }
        if self.header_bytes < CONTROL_BLOCK_BYTES || self.header_bytes % DMA_BLOCK_BYTES != 0 {
            return Err(DccError::InvalidLayout(
                "header_bytes must hold a control block and keep data 32-byte aligned",
            ));
        }
        if self.alignment_bits == 0 || self.alignment_bits % 8 != 0 {
            return Err(DccError::InvalidLayout(
                "alignment_bits must be a non-zero multiple of 8",
            ));
        }
        Ok(())
    }

    /// Number of slots, including the reserved slot 0.
    pub fn slot_count(&self) -> usize {
        usize::from(self.max_addr) + 1
    }

    /// Size of the data region, rounded up to whole DMA blocks.
    pub fn data_bytes(&self) -> usize {
        (self.slot_count() * self.bytes_per_channel).next_multiple_of(DMA_BLOCK_BYTES)
    }

    /// Total bytes of backing memory: header plus data region.
    pub fn memory_bytes(&self) -> usize {
        self.header_bytes + self.data_bytes()
    }

    /// Byte offset of `address`'s slot within the backing memory.
    pub fn slot_offset(&self, address: u8) -> usize {
        self.header_bytes + usize::from(address) * self.bytes_per_channel
    }
}

// ============================================================================
// DMA Config
// ============================================================================

/// DMA control block settings
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DmaConfig {
    /// Transfer information word (DREQ pacing, source increment)
    pub transfer_info: u32,
    /// Bus address of the data region; 0 until the platform maps memory
    pub source: u32,
    /// Bus address of the peripheral FIFO
    pub destination: u32,
}

impl Default for DmaConfig {
    fn default() -> Self {
        Self {
            transfer_info: 0x0005_0148,
            source: 0,
            destination: 0x7E20_C018,
        }
    }
}

impl DmaConfig {
    /// Set the source bus address
    pub fn with_source(mut self, source: u32) -> Self {
        self.source = source;
        self
    }

    /// Set the destination bus address
    pub fn with_destination(mut self, destination: u32) -> Self {
        self.destination = destination;
        self
    }
}

// ============================================================================
// Ramp Config
// ============================================================================

/// Speed ramp timing
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RampConfig {
    /// Interval between speed steps while accelerating, in milliseconds
    pub accelerate_ms: u32,
    /// Interval between speed steps while braking, in milliseconds
    pub brake_ms: u32,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            accelerate_ms: 200,
            brake_ms: 200,
        }
    }
}

impl RampConfig {
    /// Set the accelerate interval
    pub fn with_accelerate_ms(mut self, ms: u32) -> Self {
        self.accelerate_ms = ms;
        self
    }

    /// Set the brake interval
    pub fn with_brake_ms(mut self, ms: u32) -> Self {
        self.brake_ms = ms;
        self
    }

    /// Accelerate interval as a `Duration`
    pub fn accelerate(&self) -> Duration {
        Duration::from_millis(u64::from(self.accelerate_ms))
    }

    /// Brake interval as a `Duration`
    pub fn brake(&self) -> Duration {
        Duration::from_millis(u64::from(self.brake_ms))
    }
}

// ============================================================================
// Scheduler Config
// ============================================================================

/// Background scheduler settings
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Worker threads running ramp ticks
    pub worker_threads: usize,
    /// Longest wait for in-flight ticks at shutdown, in milliseconds
    pub shutdown_timeout_ms: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            shutdown_timeout_ms: 500,
        }
    }
}

impl SchedulerConfig {
    /// Set the worker thread count
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Set the shutdown timeout
    pub fn with_shutdown_timeout_ms(mut self, ms: u32) -> Self {
        self.shutdown_timeout_ms = ms;
        self
    }

    /// Shutdown timeout as a `Duration`
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.shutdown_timeout_ms))
    }
}

// ============================================================================
// Station Config
// ============================================================================

/// Station identification
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StationConfig {
    /// Human-readable station name
    pub name: ShortString,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: short_string("dcc-station"),
        }
    }
}

impl StationConfig {
    /// Set the station name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.layout.max_addr, 30);
        assert_eq!(config.layout.bytes_per_channel, 16);
        assert_eq!(config.ramp.accelerate_ms, 200);
        assert_eq!(config.scheduler.worker_threads, 2);
        assert_eq!(config.station.name.as_str(), "dcc-station");
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_layout(LayoutConfig::default().with_max_addr(10))
            .with_ramp(RampConfig::default().with_accelerate_ms(50).with_brake_ms(80))
            .with_scheduler(SchedulerConfig::default().with_worker_threads(0))
            .with_station(StationConfig::default().with_name("Shed"));

        assert_eq!(config.layout.max_addr, 10);
        assert_eq!(config.ramp.accelerate(), Duration::from_millis(50));
        assert_eq!(config.ramp.brake(), Duration::from_millis(80));
        assert_eq!(config.scheduler.worker_threads, 1);
        assert_eq!(config.station.name.as_str(), "Shed");
    }

    // =========================================================================
    // LayoutConfig Tests
    // =========================================================================

    #[test]
    fn default_layout_is_valid() {
        assert_eq!(LayoutConfig::default().validate(), Ok(()));
    }

    #[test]
    fn default_layout_sizes() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.slot_count(), 31);
        // 31 * 16 = 496 -> 512
        assert_eq!(layout.data_bytes(), 512);
        assert_eq!(layout.memory_bytes(), 544);
        assert_eq!(layout.slot_offset(0), 32);
        assert_eq!(layout.slot_offset(3), 32 + 48);
    }

    #[test]
    fn layout_rejects_bad_values() {
        assert!(LayoutConfig::default().with_max_addr(0).validate().is_err());
        assert!(LayoutConfig::default().with_max_addr(128).validate().is_err());
        assert!(LayoutConfig::default()
            .with_bytes_per_channel(18)
            .validate()
            .is_err());
        assert!(LayoutConfig::default()
            .with_alignment_bits(12)
            .validate()
            .is_err());

        let mut layout = LayoutConfig::default();
        layout.header_bytes = 16;
        assert!(layout.validate().is_err());
    }

    // =========================================================================
    // Other Section Tests
    // =========================================================================

    #[test]
    fn dma_config_default() {
        let dma = DmaConfig::default();
        assert_eq!(dma.transfer_info, 0x0005_0148);
        assert_eq!(dma.source, 0);
        assert_eq!(dma.destination, 0x7E20_C018);

        let dma = dma.with_source(0xC000_1000).with_destination(0x7E20_C000);
        assert_eq!(dma.source, 0xC000_1000);
        assert_eq!(dma.destination, 0x7E20_C000);
    }

    #[test]
    fn scheduler_timeout_duration() {
        let scheduler = SchedulerConfig::default().with_shutdown_timeout_ms(250);
        assert_eq!(scheduler.shutdown_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn short_string_utf8_boundary() {
        // 4-byte characters: 16 fit exactly, the 17th must not be split
        let input = "\u{1F682}".repeat(17);
        let s = short_string(&input);
        assert_eq!(s.len(), 64);
        assert!(core::str::from_utf8(s.as_bytes()).is_ok());
    }

    #[cfg(feature = "serde-json")]
    #[test]
    fn config_from_partial_json() {
        let config =
            Config::from_json(r#"{"layout": {"max_addr": 12}, "ramp": {"brake_ms": 400}}"#).unwrap();
        assert_eq!(config.layout.max_addr, 12);
        assert_eq!(config.layout.bytes_per_channel, 16);
        assert_eq!(config.ramp.brake_ms, 400);
        assert_eq!(config.ramp.accelerate_ms, 200);
    }
}
