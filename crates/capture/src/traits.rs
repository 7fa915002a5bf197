//! Collaborator capabilities driven by a capture session

use pixels::{Background, CaptureRect, PixelBuffer};

use crate::CaptureResult;

/// Raw screen pixel capture.
///
/// Returns what is on screen right now, composited and opaque.
pub trait PixelCapture {
    /// Allocate off-screen drawing resources for `rect`
    fn prepare(&mut self, _rect: &CaptureRect) -> CaptureResult<()> {
        Ok(())
    }

    /// Copy the on-screen pixels of `rect` as a `Bgrx8` buffer
    fn capture(&mut self, rect: &CaptureRect) -> CaptureResult<PixelBuffer>;

    /// Free whatever `prepare` allocated
    fn release(&mut self) {}
}

/// Compositor synchronization
pub trait CompositorFlush {
    /// Block until every pending visual change is on screen.
    ///
    /// There is no timeout; a compositor that never presents hangs the caller.
    fn flush(&self) -> CaptureResult<()>;
}

/// Creates shield surfaces
pub trait SurfaceControl {
    /// Create a shield exactly covering `rect`, filled with `background`,
    /// below every other surface and transparent to input
    fn create_shield(
        &mut self,
        rect: &CaptureRect,
        background: Background,
    ) -> CaptureResult<Box<dyn ShieldSurface>>;
}

/// On-screen surface that only supplies background color behind translucent content
pub trait ShieldSurface {
    /// Change the fill color. Takes effect on the next redraw.
    fn set_background(&mut self, background: Background) -> CaptureResult<()>;

    /// Repaint now with the current fill color
    fn redraw(&mut self) -> CaptureResult<()>;

    /// Remove the surface from the screen
    fn destroy(self: Box<Self>) -> CaptureResult<()>;
}

/// One implementation of every collaborator a session needs
pub struct Platform {
    pub capture: Box<dyn PixelCapture>,
    pub compositor: Box<dyn CompositorFlush>,
    pub surfaces: Box<dyn SurfaceControl>,
}

impl Platform {
    pub fn new(
        capture: Box<dyn PixelCapture>,
        compositor: Box<dyn CompositorFlush>,
        surfaces: Box<dyn SurfaceControl>,
    ) -> Self {
        Self {
            capture,
            compositor,
            surfaces,
        }
    }
}
