//! Windows backend: GDI screen capture, DWM flush and the shield window

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use pixels::{Background, CaptureRect, PixelBuffer, PixelFormat, RowOrder};
use tracing::{debug, warn};
use windows::Win32::Foundation::{
    COLORREF, GetLastError, HINSTANCE, HWND, LPARAM, LRESULT, RECT, TRUE, WPARAM,
};
use windows::Win32::Graphics::Dwm::DwmFlush;
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CAPTUREBLT, CreateCompatibleBitmap,
    CreateCompatibleDC, CreateSolidBrush, DIB_RGB_COLORS, DeleteDC, DeleteObject, FillRect,
    GetDC, GetDIBits, HBITMAP, HDC, InvalidateRect, ROP_CODE, ReleaseDC, SRCCOPY, SelectObject,
    UpdateWindow,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CS_NOCLOSE, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect,
    GetSystemMetrics, HMENU, HWND_BOTTOM, MSG, PM_REMOVE, PeekMessageW, RegisterClassExW,
    SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN,
    SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SWP_SHOWWINDOW, SetProcessDPIAware, SetWindowPos,
    TranslateMessage, WM_ERASEBKGND, WNDCLASSEXW, WS_DISABLED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_EX_TRANSPARENT, WS_POPUP,
};
use windows::core::{PCWSTR, w};

use crate::{
    CaptureError, CaptureResult, CompositorFlush, PixelCapture, ShieldSurface, SurfaceControl,
};

const SHIELD_CLASS_NAME: PCWSTR = w!("GlassnapShield");

/// Atom of the registered shield class, zero until first use
static SHIELD_CLASS: Mutex<u16> = Mutex::new(0);

/// Gray level the shield paints; sessions are serialized so one value suffices
static SHIELD_LEVEL: AtomicU8 = AtomicU8::new(u8::MAX);

/// Bounds of the whole virtual desktop across all monitors
pub fn virtual_screen() -> CaptureResult<CaptureRect> {
    let (left, top, width, height) = unsafe {
        (
            GetSystemMetrics(SM_XVIRTUALSCREEN),
            GetSystemMetrics(SM_YVIRTUALSCREEN),
            GetSystemMetrics(SM_CXVIRTUALSCREEN),
            GetSystemMetrics(SM_CYVIRTUALSCREEN),
        )
    };

    Ok(CaptureRect::new(
        left,
        top,
        u32::try_from(width).unwrap_or(0),
        u32::try_from(height).unwrap_or(0),
    )?)
}

/// Opt out of DPI virtualization so coordinates are physical pixels
pub fn enable_dpi_awareness() {
    if !unsafe { SetProcessDPIAware() }.as_bool() {
        warn!("SetProcessDPIAware failed; captures may be scaled");
    }
}

fn extent(value: u32) -> CaptureResult<i32> {
    i32::try_from(value)
        .map_err(|_| CaptureError::Platform(format!("extent {value} exceeds GDI limits")))
}

fn last_error(call: &str) -> String {
    format!("{call} failed: {:?}", unsafe { GetLastError() })
}

/// Screen DC plus an off-screen bitmap sized to the capture rectangle
struct GdiSurface {
    screen_dc: HDC,
    mem_dc: HDC,
    bitmap: HBITMAP,
    width: i32,
    height: i32,
}

impl GdiSurface {
    fn new(rect: &CaptureRect) -> CaptureResult<Self> {
        let width = extent(rect.width)?;
        let height = extent(rect.height)?;

        let screen_dc = unsafe { GetDC(HWND(null_mut())) };
        if screen_dc.is_invalid() {
            return Err(CaptureError::ResourceExhausted(last_error("GetDC")));
        }

        // Anything left null below is skipped by Drop
        let mut surface = Self {
            screen_dc,
            mem_dc: HDC(null_mut()),
            bitmap: HBITMAP(null_mut()),
            width,
            height,
        };

        surface.mem_dc = unsafe { CreateCompatibleDC(screen_dc) };
        if surface.mem_dc.is_invalid() {
            return Err(CaptureError::ResourceExhausted(last_error(
                "CreateCompatibleDC",
            )));
        }

        surface.bitmap = unsafe { CreateCompatibleBitmap(screen_dc, width, height) };
        if surface.bitmap.is_invalid() {
            return Err(CaptureError::ResourceExhausted(last_error(
                "CreateCompatibleBitmap",
            )));
        }

        debug!("Allocated {}x{} GDI capture surface", width, height);
        Ok(surface)
    }

    fn matches(&self, rect: &CaptureRect) -> bool {
        self.width as i64 == rect.width as i64 && self.height as i64 == rect.height as i64
    }

    fn blit(&self, rect: &CaptureRect) -> CaptureResult<()> {
        let previous = unsafe { SelectObject(self.mem_dc, self.bitmap) };
        if previous.is_invalid() {
            return Err(CaptureError::CaptureFailed(last_error("SelectObject")));
        }

        // CAPTUREBLT includes layered (translucent) windows in the copy
        let copied = unsafe {
            BitBlt(
                self.mem_dc,
                0,
                0,
                self.width,
                self.height,
                self.screen_dc,
                rect.left,
                rect.top,
                ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
            )
        };

        unsafe {
            SelectObject(self.mem_dc, previous);
        }
        copied.map_err(|e| CaptureError::CaptureFailed(format!("BitBlt failed: {e}")))
    }

    fn read(&self, rect: &CaptureRect) -> CaptureResult<PixelBuffer> {
        let mut data = vec![0u8; rect.byte_len()?];
        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: self.width,
                // Negative height asks for top-down rows
                biHeight: -self.height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let lines = unsafe {
            GetDIBits(
                self.mem_dc,
                self.bitmap,
                0,
                self.height as u32,
                Some(data.as_mut_ptr().cast::<c_void>()),
                &mut info,
                DIB_RGB_COLORS,
            )
        };
        if lines != self.height {
            return Err(CaptureError::CaptureFailed(format!(
                "GetDIBits copied {lines} of {} rows",
                self.height
            )));
        }

        Ok(PixelBuffer::new(
            rect.width,
            rect.height,
            PixelFormat::Bgrx8,
            RowOrder::TopDown,
            data,
        )?)
    }
}

impl Drop for GdiSurface {
    fn drop(&mut self) {
        unsafe {
            if !self.bitmap.is_invalid() {
                let _ = DeleteObject(self.bitmap);
            }
            if !self.mem_dc.is_invalid() {
                let _ = DeleteDC(self.mem_dc);
            }
            if !self.screen_dc.is_invalid() {
                ReleaseDC(HWND(null_mut()), self.screen_dc);
            }
        }
    }
}

/// Pixel capture through a GDI `BitBlt` of the desktop DC
#[derive(Default)]
pub struct GdiCapture {
    surface: Option<GdiSurface>,
}

impl GdiCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PixelCapture for GdiCapture {
    fn prepare(&mut self, rect: &CaptureRect) -> CaptureResult<()> {
        self.surface = Some(GdiSurface::new(rect)?);
        Ok(())
    }

    fn capture(&mut self, rect: &CaptureRect) -> CaptureResult<PixelBuffer> {
        // Allocation belongs to Initialize; a capture without it is out of order
        let surface = self
            .surface
            .as_ref()
            .filter(|surface| surface.matches(rect))
            .ok_or_else(|| {
                CaptureError::Internal(format!("no GDI surface prepared for {rect}"))
            })?;

        surface.blit(rect)?;
        surface.read(rect)
    }

    fn release(&mut self) {
        self.surface = None;
    }
}

/// Compositor flush through the Desktop Window Manager
#[derive(Default)]
pub struct DwmCompositor;

impl CompositorFlush for DwmCompositor {
    fn flush(&self) -> CaptureResult<()> {
        unsafe { DwmFlush() }.map_err(|e| CaptureError::FlushFailed(e.to_string()))
    }
}

fn register_shield_class(instance: HINSTANCE) -> CaptureResult<()> {
    let mut atom = SHIELD_CLASS.lock();
    if *atom != 0 {
        return Ok(());
    }

    let class = WNDCLASSEXW {
        cbSize: size_of::<WNDCLASSEXW>() as u32,
        style: CS_NOCLOSE,
        lpfnWndProc: Some(shield_proc),
        hInstance: instance,
        lpszClassName: SHIELD_CLASS_NAME,
        ..Default::default()
    };

    let registered = unsafe { RegisterClassExW(&class) };
    if registered == 0 {
        return Err(CaptureError::ResourceExhausted(last_error(
            "RegisterClassExW",
        )));
    }

    debug!("Registered shield window class");
    *atom = registered;
    Ok(())
}

unsafe extern "system" fn shield_proc(
    window: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match message {
        WM_ERASEBKGND => {
            let dc = HDC(wparam.0 as *mut c_void);
            let level = SHIELD_LEVEL.load(Ordering::Acquire) as u32;
            let mut client = RECT::default();
            unsafe {
                let _ = GetClientRect(window, &mut client);
                let brush = CreateSolidBrush(COLORREF(level | (level << 8) | (level << 16)));
                FillRect(dc, &client, brush);
                let _ = DeleteObject(brush);
            }
            LRESULT(1)
        }
        _ => unsafe { DefWindowProcW(window, message, wparam, lparam) },
    }
}

/// Dispatch whatever is queued for `window` so paints happen now
fn pump_messages(window: HWND) {
    let mut message = MSG::default();
    unsafe {
        while PeekMessageW(&mut message, window, 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&message);
            DispatchMessageW(&message);
        }
    }
}

/// Creates shield windows
#[derive(Default)]
pub struct ShieldWindows;

impl SurfaceControl for ShieldWindows {
    fn create_shield(
        &mut self,
        rect: &CaptureRect,
        background: Background,
    ) -> CaptureResult<Box<dyn ShieldSurface>> {
        let module = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .map_err(|e| CaptureError::Platform(format!("GetModuleHandleW failed: {e}")))?;
        let instance = HINSTANCE(module.0);
        register_shield_class(instance)?;

        SHIELD_LEVEL.store(background.reference_level(), Ordering::Release);

        // Disabled, non-activating and click-through: the shield never takes input
        let window = unsafe {
            CreateWindowExW(
                WS_EX_NOACTIVATE | WS_EX_TOOLWINDOW | WS_EX_TRANSPARENT,
                SHIELD_CLASS_NAME,
                w!("Glassnap"),
                WS_POPUP | WS_DISABLED,
                rect.left,
                rect.top,
                extent(rect.width)?,
                extent(rect.height)?,
                HWND::default(),
                HMENU::default(),
                instance,
                None,
            )
        }
        .map_err(|e| CaptureError::ResourceExhausted(format!("CreateWindowExW failed: {e}")))?;

        let mut shield = ShieldWindow { window };

        // Below every other window so it only shows through translucent pixels
        unsafe {
            SetWindowPos(
                window,
                HWND_BOTTOM,
                0,
                0,
                0,
                0,
                SWP_NOSIZE | SWP_NOMOVE | SWP_SHOWWINDOW | SWP_NOACTIVATE,
            )
        }
        .map_err(|e| {
            let _ = unsafe { DestroyWindow(window) };
            CaptureError::Platform(format!("SetWindowPos failed: {e}"))
        })?;

        shield.redraw()?;
        debug!("Shield window created over {}", rect);
        Ok(Box::new(shield))
    }
}

/// Bottom-most window painted a solid background color
pub struct ShieldWindow {
    window: HWND,
}

impl ShieldSurface for ShieldWindow {
    fn set_background(&mut self, background: Background) -> CaptureResult<()> {
        SHIELD_LEVEL.store(background.reference_level(), Ordering::Release);
        Ok(())
    }

    fn redraw(&mut self) -> CaptureResult<()> {
        unsafe {
            let _ = InvalidateRect(self.window, None, TRUE);
            if !UpdateWindow(self.window).as_bool() {
                return Err(CaptureError::Platform(last_error("UpdateWindow")));
            }
        }
        pump_messages(self.window);
        Ok(())
    }

    fn destroy(self: Box<Self>) -> CaptureResult<()> {
        let destroyed = unsafe { DestroyWindow(self.window) }
            .map_err(|e| CaptureError::Platform(format!("DestroyWindow failed: {e}")));
        pump_messages(self.window);
        destroyed
    }
}
