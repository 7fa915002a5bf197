//! Simulated compositor for exercising sessions without a display.
//!
//! Background changes only become visible after a flush, the way a real
//! compositor presents them, so a capture taken out of order reads the
//! previous background.

use std::sync::Arc;

use parking_lot::Mutex;
use pixels::{Background, CaptureRect, PixelBuffer, PixelFormat, RowOrder};

use crate::{
    CaptureError, CaptureResult, CompositorFlush, PixelCapture, Platform, ShieldSurface,
    SurfaceControl,
};

/// Desktop color behind the shield when no shield is on screen
const DESKTOP_LEVEL: u8 = 0x40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Prepare,
    CreateShield(Background),
    Flush,
    Capture,
    SetBackground(Background),
    Redraw,
    DestroyShield,
    Release,
}

#[derive(Default)]
struct State {
    width: u32,
    height: u32,
    /// Straight RGB and alpha of the content above the shield, top-down
    source: Vec<([u8; 3], u8)>,
    requested: Option<Background>,
    painted: Option<Background>,
    shown: Option<Background>,
    events: Vec<Event>,
    captures: usize,
    flushes: usize,
    fail_shield: bool,
    fail_capture: Option<usize>,
    fail_flush: Option<usize>,
    fail_redraw: bool,
    shrink: bool,
}

#[derive(Clone)]
pub struct SimulatedDesktop {
    state: Arc<Mutex<State>>,
}

impl SimulatedDesktop {
    /// Screen of `width`x`height` with nothing but the shield visible
    pub fn new(width: u32, height: u32) -> Self {
        let state = State {
            width,
            height,
            source: vec![([0, 0, 0], 0); (width * height) as usize],
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn set_source(&self, x: u32, y: u32, rgb: [u8; 3], alpha: u8) {
        let mut state = self.state.lock();
        let index = (y * state.width + x) as usize;
        state.source[index] = (rgb, alpha);
    }

    pub fn fail_shield_creation(&self) {
        self.state.lock().fail_shield = true;
    }

    /// Make the n-th capture (1-based) fail
    pub fn fail_capture_number(&self, n: usize) {
        self.state.lock().fail_capture = Some(n);
    }

    /// Make the n-th compositor flush (1-based) fail
    pub fn fail_flush_number(&self, n: usize) {
        self.state.lock().fail_flush = Some(n);
    }

    /// Make every shield repaint fail
    pub fn fail_redraw(&self) {
        self.state.lock().fail_redraw = true;
    }

    /// Return buffers one pixel narrower than requested
    pub fn shrink_captures(&self) {
        self.state.lock().shrink = true;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub fn shield_visible(&self) -> bool {
        self.state.lock().painted.is_some()
    }

    pub fn platform(&self) -> Platform {
        Platform::new(
            Box::new(self.clone()),
            Box::new(self.clone()),
            Box::new(self.clone()),
        )
    }
}

impl PixelCapture for SimulatedDesktop {
    fn prepare(&mut self, _rect: &CaptureRect) -> CaptureResult<()> {
        self.state.lock().events.push(Event::Prepare);
        Ok(())
    }

    fn capture(&mut self, rect: &CaptureRect) -> CaptureResult<PixelBuffer> {
        let mut state = self.state.lock();
        state.events.push(Event::Capture);
        state.captures += 1;
        if state.fail_capture == Some(state.captures) {
            return Err(CaptureError::CaptureFailed("simulated BitBlt failure".into()));
        }

        let backdrop = state
            .shown
            .map(|background| background.reference_level())
            .unwrap_or(DESKTOP_LEVEL) as u32;
        let width = if state.shrink { rect.width - 1 } else { rect.width };

        // Stored bottom-up like a GDI DIB
        let mut data = Vec::with_capacity((width * rect.height * 4) as usize);
        for y in (0..rect.height).rev() {
            for x in 0..width {
                let (rgb, alpha) = state.source[(y * state.width + x) as usize];
                let a = alpha as u32;
                let [r, g, b] = rgb.map(|c| ((c as u32 * a + backdrop * (255 - a) + 127) / 255) as u8);
                data.extend_from_slice(&[b, g, r, 0xFF]);
            }
        }

        Ok(PixelBuffer::new(
            width,
            rect.height,
            PixelFormat::Bgrx8,
            RowOrder::BottomUp,
            data,
        )?)
    }

    fn release(&mut self) {
        self.state.lock().events.push(Event::Release);
    }
}

impl CompositorFlush for SimulatedDesktop {
    fn flush(&self) -> CaptureResult<()> {
        let mut state = self.state.lock();
        state.events.push(Event::Flush);
        state.flushes += 1;
        if state.fail_flush == Some(state.flushes) {
            return Err(CaptureError::FlushFailed("simulated DwmFlush failure".into()));
        }
        state.shown = state.painted;
        Ok(())
    }
}

impl SurfaceControl for SimulatedDesktop {
    fn create_shield(
        &mut self,
        _rect: &CaptureRect,
        background: Background,
    ) -> CaptureResult<Box<dyn ShieldSurface>> {
        let mut state = self.state.lock();
        if state.fail_shield {
            return Err(CaptureError::ResourceExhausted(
                "simulated CreateWindowEx failure".into(),
            ));
        }
        state.events.push(Event::CreateShield(background));
        state.requested = Some(background);
        state.painted = Some(background);
        drop(state);

        Ok(Box::new(SimulatedShield {
            desktop: self.clone(),
        }))
    }
}

struct SimulatedShield {
    desktop: SimulatedDesktop,
}

impl ShieldSurface for SimulatedShield {
    fn set_background(&mut self, background: Background) -> CaptureResult<()> {
        let mut state = self.desktop.state.lock();
        state.events.push(Event::SetBackground(background));
        state.requested = Some(background);
        Ok(())
    }

    fn redraw(&mut self) -> CaptureResult<()> {
        let mut state = self.desktop.state.lock();
        state.events.push(Event::Redraw);
        if state.fail_redraw {
            return Err(CaptureError::Platform("simulated UpdateWindow failure".into()));
        }
        state.painted = state.requested;
        Ok(())
    }

    fn destroy(self: Box<Self>) -> CaptureResult<()> {
        let mut state = self.desktop.state.lock();
        state.events.push(Event::DestroyShield);
        state.requested = None;
        state.painted = None;
        Ok(())
    }
}
