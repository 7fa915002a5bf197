//! Capture rectangle and reference backgrounds

use serde::{Deserialize, Serialize};

use crate::{BYTES_PER_PIXEL, PixelError, PixelResult};

/// Region of the virtual screen to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRect {
    /// Left edge in virtual-screen coordinates (may be negative)
    pub left: i32,
    /// Top edge in virtual-screen coordinates (may be negative)
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> PixelResult<Self> {
        let rect = Self {
            left,
            top,
            width,
            height,
        };
        rect.validate()?;
        Ok(rect)
    }

    /// Reject empty or unaddressable rectangles.
    ///
    /// Deserialized rectangles bypass [`CaptureRect::new`], so callers
    /// holding one from config should run this before shooting.
    pub fn validate(&self) -> PixelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PixelError::EmptyRect {
                width: self.width,
                height: self.height,
            });
        }
        self.byte_len().map(|_| ())
    }

    /// Size in bytes of one packed 32-bit buffer covering this rectangle
    pub fn byte_len(&self) -> PixelResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .filter(|len| *len <= isize::MAX as usize)
            .ok_or(PixelError::TooLarge {
                width: self.width,
                height: self.height,
            })
    }
}

impl std::fmt::Display for CaptureRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Solid color shown behind the captured region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    /// Pure white
    Light,
    /// Pure black
    Dark,
}

impl Background {
    /// Per-channel value of the background, identical on all channels
    pub fn reference_level(&self) -> u8 {
        match self {
            Background::Light => u8::MAX,
            Background::Dark => 0,
        }
    }
}
