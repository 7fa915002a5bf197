//! Pixel Types - Shared data model for Glassnap
//!
//! Capture rectangles, raw and reconstructed pixel buffers, and the two
//! reference backgrounds used by the dual-exposure capture.

mod buffer;
mod error;
mod rect;

pub use buffer::*;
pub use error::*;
pub use rect::*;

/// Every buffer format in this workspace packs one pixel into four bytes
pub const BYTES_PER_PIXEL: usize = 4;
