//! Per-pixel inversion of the source-over operator

use std::time::Instant;

use pixels::{PixelBuffer, PixelFormat};
use rayon::prelude::*;
use tracing::debug;

use crate::{UnblendError, UnblendResult};

const FULL: i32 = u8::MAX as i32;

/// Recover one straight RGBA pixel from its two opaque observations.
///
/// `light` and `dark` are B, G, R, x samples of the same source pixel over
/// white and over black. The three per-channel alpha estimates are averaged
/// to damp quantization noise, then each channel is unpremultiplied from the
/// light sample. Output is R, G, B, A, every byte clamped into range even for
/// observation pairs no real compositor could produce.
#[inline]
pub fn unblend_pixel(light: [u8; 4], dark: [u8; 4]) -> [u8; 4] {
    let [light_b, light_g, light_r, _] = light.map(i32::from);
    let [dark_b, dark_g, dark_r, _] = dark.map(i32::from);

    let alpha = ((dark_b - light_b + FULL) + (dark_g - light_g + FULL) + (dark_r - light_r + FULL))
        / 3;

    // Nothing of the source reached either capture, so there is no color to recover
    if alpha == 0 {
        return [0; 4];
    }

    let alpha = alpha.min(FULL);
    let unpremultiply = |channel: i32| ((channel + alpha - FULL) * FULL / alpha).clamp(0, FULL) as u8;

    [
        unpremultiply(light_r),
        unpremultiply(light_g),
        unpremultiply(light_b),
        alpha as u8,
    ]
}

/// Rewrite a row of light samples into RGBA in place.
///
/// Only whole pixels present in both rows are touched.
pub fn unblend_row(light_row: &mut [u8], dark_row: &[u8]) {
    for (light, dark) in light_row.chunks_exact_mut(4).zip(dark_row.chunks_exact(4)) {
        let pixel = unblend_pixel(
            [light[0], light[1], light[2], light[3]],
            [dark[0], dark[1], dark[2], dark[3]],
        );
        light.copy_from_slice(&pixel);
    }
}

/// Combine the light and dark exposures into one RGBA buffer.
///
/// Consumes both exposures. The light buffer's storage is rewritten in place
/// and returned as the result; the dark buffer is dropped before returning.
/// Rows are independent and are processed in parallel.
pub fn reconstruct(light: PixelBuffer, dark: PixelBuffer) -> UnblendResult<PixelBuffer> {
    expect_opaque(&light)?;
    expect_opaque(&dark)?;

    if !light.same_layout(&dark) {
        return Err(UnblendError::LayoutMismatch {
            light: describe(&light),
            dark: describe(&dark),
        });
    }

    let mut output = light;
    if output.pixel_count() == 0 {
        return Ok(output.with_format(PixelFormat::Rgba8));
    }

    let started = Instant::now();
    let stride = output.stride();

    output
        .as_bytes_mut()
        .par_chunks_mut(stride)
        .zip(dark.as_bytes().par_chunks(stride))
        .for_each(|(light_row, dark_row)| unblend_row(light_row, dark_row));
    drop(dark);

    debug!(
        "Reconstructed alpha for {}x{} in {} us",
        output.width(),
        output.height(),
        started.elapsed().as_micros()
    );

    Ok(output.with_format(PixelFormat::Rgba8))
}

fn expect_opaque(buffer: &PixelBuffer) -> UnblendResult<()> {
    if buffer.format() != PixelFormat::Bgrx8 {
        return Err(UnblendError::FormatMismatch {
            expected: PixelFormat::Bgrx8,
            actual: buffer.format(),
        });
    }
    Ok(())
}

fn describe(buffer: &PixelBuffer) -> String {
    format!(
        "{}x{} {:?}",
        buffer.width(),
        buffer.height(),
        buffer.row_order()
    )
}
