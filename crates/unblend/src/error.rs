//! Reconstruction error types

use pixels::PixelFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnblendError {
    #[error("Unexpected pixel format: expected {expected:?}, got {actual:?}")]
    FormatMismatch {
        expected: PixelFormat,
        actual: PixelFormat,
    },

    #[error("Exposure layouts differ: light {light}, dark {dark}")]
    LayoutMismatch { light: String, dark: String },
}

pub type UnblendResult<T> = Result<T, UnblendError>;
