//! Error types for pixel buffers

use thiserror::Error;

/// Pixel data model error
#[derive(Debug, Error)]
pub enum PixelError {
    #[error("Capture rectangle is empty: {width}x{height}")]
    EmptyRect { width: u32, height: u32 },

    #[error("Buffer too large: {width}x{height} pixels")]
    TooLarge { width: u32, height: u32 },

    #[error("Buffer length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Result type alias for pixel operations
pub type PixelResult<T> = Result<T, PixelError>;
