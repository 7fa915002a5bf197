//! Screen Capture - Translucency-preserving screenshots for Glassnap
//!
//! Screen capture primitives only return opaque pixels. To recover alpha,
//! a session places a solid shield window behind the region, captures the
//! frame over white, repaints the shield black, captures again, and hands
//! both exposures to [`unblend::reconstruct`].
//!
//! Platform backends:
//! - Windows: GDI `BitBlt`, `DwmFlush`, bottom-most shield window
//!
//! Known gap: nothing detects on-screen changes between the two exposures.
//! Animated content or a window moving mid-session yields wrong alpha for
//! the affected pixels.

mod error;
mod session;
mod traits;

#[cfg(test)]
mod testing;

#[cfg(target_os = "windows")]
mod win32;

pub use error::*;
pub use pixels::{Background, CaptureRect, PixelBuffer, PixelFormat, RowOrder};
pub use session::*;
pub use traits::*;

#[cfg(target_os = "windows")]
pub use self::win32::{DwmCompositor, GdiCapture, ShieldWindow, ShieldWindows};

/// Create the collaborators for the current platform
pub fn create_platform() -> CaptureResult<Platform> {
    #[cfg(target_os = "windows")]
    {
        Ok(Platform::new(
            Box::new(GdiCapture::new()),
            Box::new(DwmCompositor),
            Box::new(ShieldWindows),
        ))
    }

    #[cfg(not(target_os = "windows"))]
    {
        Err(CaptureError::UnsupportedPlatform)
    }
}

/// Bounds of the whole virtual desktop
pub fn virtual_screen() -> CaptureResult<CaptureRect> {
    #[cfg(target_os = "windows")]
    {
        win32::virtual_screen()
    }

    #[cfg(not(target_os = "windows"))]
    {
        Err(CaptureError::UnsupportedPlatform)
    }
}

/// Make capture rectangles refer to physical pixels. Call once at startup.
pub fn enable_dpi_awareness() {
    #[cfg(target_os = "windows")]
    win32::enable_dpi_awareness();
}

/// Capture `rect` with its transparency reconstructed, as RGBA.
///
/// Failures are final; the caller should not retry.
pub fn shoot(rect: CaptureRect) -> CaptureResult<PixelBuffer> {
    let mut platform = create_platform()?;
    shoot_with(&mut platform, rect)
}

/// [`shoot`] with caller-supplied collaborators
pub fn shoot_with(platform: &mut Platform, rect: CaptureRect) -> CaptureResult<PixelBuffer> {
    let exposures = DualExposure::new(platform, rect)?.run()?;
    Ok(unblend::reconstruct(exposures.light, exposures.dark)?)
}
