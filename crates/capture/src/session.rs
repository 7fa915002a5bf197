//! Dual-exposure capture session
//!
//! Captures the same on-screen frame twice, once over a white shield and
//! once over a black one. Every background change is followed by a
//! compositor flush before the next capture; capturing before the flush
//! would read the previous background and corrupt the alpha silently.

use std::time::Instant;

use parking_lot::Mutex;
use pixels::{Background, CaptureRect, PixelBuffer, PixelFormat};
use tracing::{debug, info, warn};

use crate::{CaptureError, CaptureResult, Platform, ShieldSurface};

/// Shield registration is process-global, so sessions run one at a time
static SESSION_LOCK: Mutex<()> = Mutex::new(());

/// Session stage, executed strictly in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Allocate drawing resources and show the white shield
    Initialize,
    /// Wait for the white shield to be composited
    SettleLight,
    /// Capture over white
    CaptureLight,
    /// Repaint the shield black
    SwapBackground,
    /// Wait for the black shield to be composited
    SettleDark,
    /// Capture over black
    CaptureDark,
    /// Remove the shield and free drawing resources
    Teardown,
}

impl SessionStage {
    pub const ORDER: [SessionStage; 7] = [
        SessionStage::Initialize,
        SessionStage::SettleLight,
        SessionStage::CaptureLight,
        SessionStage::SwapBackground,
        SessionStage::SettleDark,
        SessionStage::CaptureDark,
        SessionStage::Teardown,
    ];

    /// Following stage, `None` after teardown
    pub fn next(self) -> Option<SessionStage> {
        let index = Self::ORDER.iter().position(|stage| *stage == self)?;
        Self::ORDER.get(index + 1).copied()
    }
}

/// The two raw captures of one session
#[derive(Debug)]
pub struct Exposures {
    /// Frame composited over white
    pub light: PixelBuffer,
    /// Frame composited over black
    pub dark: PixelBuffer,
}

/// One capture session over a fixed rectangle
pub struct DualExposure<'p> {
    platform: &'p mut Platform,
    rect: CaptureRect,
    shield: Option<Box<dyn ShieldSurface>>,
    light: Option<PixelBuffer>,
    dark: Option<PixelBuffer>,
}

impl<'p> DualExposure<'p> {
    pub fn new(platform: &'p mut Platform, rect: CaptureRect) -> CaptureResult<Self> {
        rect.validate()?;

        Ok(Self {
            platform,
            rect,
            shield: None,
            light: None,
            dark: None,
        })
    }

    /// Run every stage in order and return both exposures.
    ///
    /// Teardown runs even when an earlier stage fails; the first error wins.
    pub fn run(mut self) -> CaptureResult<Exposures> {
        let _session = SESSION_LOCK.lock();
        let started = Instant::now();
        info!("Starting dual-exposure capture of {}", self.rect);

        self.run_stages()?;

        let (Some(light), Some(dark)) = (self.light.take(), self.dark.take()) else {
            return Err(CaptureError::Internal(
                "session finished without both exposures".to_string(),
            ));
        };

        info!(
            "Captured {} twice in {} ms",
            self.rect,
            started.elapsed().as_millis()
        );

        Ok(Exposures { light, dark })
    }

    /// Walk the stages from Initialize through Teardown.
    ///
    /// A failing stage short-circuits straight to teardown.
    fn run_stages(&mut self) -> CaptureResult<()> {
        let mut next = Some(SessionStage::Initialize);
        while let Some(stage) = next {
            debug!("Capture stage {:?}", stage);

            if let Err(err) = self.execute(stage) {
                if stage != SessionStage::Teardown {
                    debug!("Capture stage {:?} after failed {:?}", SessionStage::Teardown, stage);
                    if let Err(teardown_err) = self.teardown() {
                        warn!("Teardown after failed {:?} also failed: {}", stage, teardown_err);
                    }
                }
                return Err(err);
            }
            next = stage.next();
        }
        Ok(())
    }

    fn execute(&mut self, stage: SessionStage) -> CaptureResult<()> {
        match stage {
            SessionStage::Initialize => {
                self.platform.capture.prepare(&self.rect)?;
                let shield = self
                    .platform
                    .surfaces
                    .create_shield(&self.rect, Background::Light)?;
                self.shield = Some(shield);
            }
            SessionStage::SettleLight | SessionStage::SettleDark => {
                self.platform.compositor.flush()?;
            }
            SessionStage::CaptureLight => {
                self.light = Some(self.grab()?);
            }
            SessionStage::SwapBackground => {
                let shield = self.shield.as_mut().ok_or_else(|| {
                    CaptureError::Internal("shield missing before background swap".to_string())
                })?;
                shield.set_background(Background::Dark)?;
                shield.redraw()?;
            }
            SessionStage::CaptureDark => {
                self.dark = Some(self.grab()?);
            }
            SessionStage::Teardown => self.teardown()?,
        }
        Ok(())
    }

    fn grab(&mut self) -> CaptureResult<PixelBuffer> {
        let buffer = self.platform.capture.capture(&self.rect)?;

        if buffer.width() != self.rect.width
            || buffer.height() != self.rect.height
            || buffer.format() != PixelFormat::Bgrx8
        {
            return Err(CaptureError::UnexpectedBuffer {
                width: self.rect.width,
                height: self.rect.height,
                actual_width: buffer.width(),
                actual_height: buffer.height(),
                actual_format: buffer.format(),
            });
        }

        Ok(buffer)
    }

    fn teardown(&mut self) -> CaptureResult<()> {
        let destroyed = match self.shield.take() {
            Some(shield) => shield.destroy(),
            None => Ok(()),
        };
        self.platform.capture.release();

        destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, SimulatedDesktop};

    #[test]
    fn test_stage_order() {
        let mut stage = SessionStage::Initialize;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen, SessionStage::ORDER);
        assert_eq!(SessionStage::Teardown.next(), None);
    }

    #[test]
    fn test_flush_precedes_every_capture() {
        let desktop = SimulatedDesktop::new(2, 1);
        let mut platform = desktop.platform();
        let rect = CaptureRect::new(100, 50, 2, 1).unwrap();

        DualExposure::new(&mut platform, rect).unwrap().run().unwrap();

        assert_eq!(
            desktop.events(),
            vec![
                Event::Prepare,
                Event::CreateShield(Background::Light),
                Event::Flush,
                Event::Capture,
                Event::SetBackground(Background::Dark),
                Event::Redraw,
                Event::Flush,
                Event::Capture,
                Event::DestroyShield,
                Event::Release,
            ]
        );
    }

    #[test]
    fn test_exposures_see_settled_backgrounds() {
        // Pixel 0 shows only the shield, pixel 1 is opaque green
        let desktop = SimulatedDesktop::new(2, 1);
        desktop.set_source(1, 0, [0, 255, 0], 255);
        let mut platform = desktop.platform();
        let rect = CaptureRect::new(0, 0, 2, 1).unwrap();

        let exposures = DualExposure::new(&mut platform, rect).unwrap().run().unwrap();

        assert_eq!(exposures.light.pixel(0, 0).unwrap()[..3], [255, 255, 255]);
        assert_eq!(exposures.dark.pixel(0, 0).unwrap()[..3], [0, 0, 0]);
        assert_eq!(exposures.light.pixel(1, 0).unwrap()[..3], [0, 255, 0]);
        assert_eq!(exposures.dark.pixel(1, 0).unwrap()[..3], [0, 255, 0]);
        assert!(exposures.light.same_layout(&exposures.dark));
    }

    #[test]
    fn test_shield_failure_is_fatal_and_released() {
        let desktop = SimulatedDesktop::new(4, 4);
        desktop.fail_shield_creation();
        let mut platform = desktop.platform();
        let rect = CaptureRect::new(0, 0, 4, 4).unwrap();

        let err = DualExposure::new(&mut platform, rect).unwrap().run().unwrap_err();

        assert!(matches!(err, CaptureError::ResourceExhausted(_)));
        assert_eq!(desktop.events(), vec![Event::Prepare, Event::Release]);
    }

    #[test]
    fn test_capture_failure_still_tears_down() {
        let desktop = SimulatedDesktop::new(3, 3);
        desktop.fail_capture_number(2);
        let mut platform = desktop.platform();
        let rect = CaptureRect::new(0, 0, 3, 3).unwrap();

        let err = DualExposure::new(&mut platform, rect).unwrap().run().unwrap_err();

        assert!(matches!(err, CaptureError::CaptureFailed(_)));
        let events = desktop.events();
        assert_eq!(
            &events[events.len() - 2..],
            &[Event::DestroyShield, Event::Release]
        );
        assert!(!desktop.shield_visible());
    }

    #[test]
    fn test_settle_dark_flush_failure_tears_down() {
        let desktop = SimulatedDesktop::new(2, 2);
        desktop.fail_flush_number(2);
        let mut platform = desktop.platform();
        let rect = CaptureRect::new(0, 0, 2, 2).unwrap();

        let err = DualExposure::new(&mut platform, rect).unwrap().run().unwrap_err();

        assert!(matches!(err, CaptureError::FlushFailed(_)));
        // No dark capture after the failed flush
        assert_eq!(
            desktop.events(),
            vec![
                Event::Prepare,
                Event::CreateShield(Background::Light),
                Event::Flush,
                Event::Capture,
                Event::SetBackground(Background::Dark),
                Event::Redraw,
                Event::Flush,
                Event::DestroyShield,
                Event::Release,
            ]
        );
        assert!(!desktop.shield_visible());
    }

    #[test]
    fn test_redraw_failure_tears_down() {
        let desktop = SimulatedDesktop::new(2, 2);
        desktop.fail_redraw();
        let mut platform = desktop.platform();
        let rect = CaptureRect::new(0, 0, 2, 2).unwrap();

        let err = DualExposure::new(&mut platform, rect).unwrap().run().unwrap_err();

        assert!(matches!(err, CaptureError::Platform(_)));
        let events = desktop.events();
        assert_eq!(
            &events[events.len() - 3..],
            &[Event::Redraw, Event::DestroyShield, Event::Release]
        );
        assert!(!desktop.shield_visible());
    }

    #[test]
    fn test_wrong_sized_capture_is_rejected() {
        let desktop = SimulatedDesktop::new(2, 2);
        let mut platform = desktop.platform();
        let rect = CaptureRect::new(0, 0, 2, 2).unwrap();
        desktop.shrink_captures();

        let err = DualExposure::new(&mut platform, rect).unwrap().run().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::UnexpectedBuffer {
                width: 2,
                actual_width: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_empty_rect_before_touching_platform() {
        let desktop = SimulatedDesktop::new(1, 1);
        let mut platform = desktop.platform();
        let rect = CaptureRect {
            left: 0,
            top: 0,
            width: 0,
            height: 1,
        };

        assert!(matches!(
            DualExposure::new(&mut platform, rect),
            Err(CaptureError::Pixels(_))
        ));
        assert!(desktop.events().is_empty());
    }
}
