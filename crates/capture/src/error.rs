//! Capture error types

use pixels::{PixelError, PixelFormat};
use thiserror::Error;
use unblend::UnblendError;

/// Capture session error.
///
/// None of these are retried: the session has a single failure exit.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Surface or drawing resource allocation failed
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Frame capture failed: {0}")]
    CaptureFailed(String),

    #[error("Compositor flush failed: {0}")]
    FlushFailed(String),

    #[error(
        "Capture returned {actual_width}x{actual_height} {actual_format:?}, expected {width}x{height} Bgrx8"
    )]
    UnexpectedBuffer {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
        actual_format: PixelFormat,
    },

    #[error("Platform not supported")]
    UnsupportedPlatform,

    #[error("Invalid pixel data: {0}")]
    Pixels(#[from] PixelError),

    #[error("Alpha reconstruction failed: {0}")]
    Unblend(#[from] UnblendError),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
