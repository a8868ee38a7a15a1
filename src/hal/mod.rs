//! Concrete implementations of the traits defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `heap`: word-atomic RAM standing in for the DMA region
//! - `mock`: recording memory and a test-driven scheduler (requires `std`)

pub mod heap;

#[cfg(feature = "std")]
pub mod mock;

pub use heap::*;

#[cfg(feature = "std")]
pub use mock::*;
