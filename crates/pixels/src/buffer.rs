//! Packed 32-bit pixel buffers

use crate::{BYTES_PER_PIXEL, PixelError, PixelResult};

/// Byte layout of each pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// B, G, R, unused. What the screen capture returns; always opaque.
    Bgrx8,
    /// R, G, B, A with straight (unpremultiplied) color
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgrx8 | PixelFormat::Rgba8 => BYTES_PER_PIXEL,
        }
    }
}

/// Vertical orientation of the rows in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// First stored row is the top of the image
    TopDown,
    /// First stored row is the bottom of the image (GDI DIB default)
    BottomUp,
}

/// Tightly packed pixel buffer (stride is exactly `width * 4`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    row_order: RowOrder,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap existing pixel data, checking its length against the dimensions
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        row_order: RowOrder,
        data: Vec<u8>,
    ) -> PixelResult<Self> {
        let expected = Self::required_len(width, height, format)?;
        if data.len() != expected {
            return Err(PixelError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            format,
            row_order,
            data,
        })
    }

    fn required_len(width: u32, height: u32, format: PixelFormat) -> PixelResult<usize> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
            .ok_or(PixelError::TooLarge { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check whether two buffers can be combined pixel for pixel
    pub fn same_layout(&self, other: &PixelBuffer) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.row_order == other.row_order
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Pixel at visual coordinates (origin top-left), regardless of row order
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let storage_row = match self.row_order {
            RowOrder::TopDown => y,
            RowOrder::BottomUp => self.height - 1 - y,
        };
        let size = self.format.bytes_per_pixel();
        let offset = storage_row as usize * self.stride() + x as usize * size;
        let mut pixel = [0u8; 4];
        pixel.copy_from_slice(&self.data[offset..offset + size]);
        Some(pixel)
    }

    /// Relabel the bytes with a new format without touching them.
    ///
    /// Used by in-place conversions that rewrite every pixel first.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Normalize to top-down row order, flipping rows in place if needed
    pub fn into_top_down(mut self) -> Self {
        if self.row_order == RowOrder::TopDown {
            return self;
        }

        let stride = self.stride();
        let height = self.height as usize;
        for top in 0..height / 2 {
            let bottom = height - 1 - top;
            let (upper, lower) = self.data.split_at_mut(bottom * stride);
            upper[top * stride..(top + 1) * stride].swap_with_slice(&mut lower[..stride]);
        }

        self.row_order = RowOrder::TopDown;
        self
    }

    /// Give up the buffer and hand the raw bytes to the caller
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}
