//! Foreground window geometry and monitor queries.

use crate::{api_error, handle_of, hwnd_of};
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Gdi::{
    GetMonitorInfoW, MonitorFromWindow, MONITORINFO, MONITOR_DEFAULTTONEAREST,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetClassNameW, GetForegroundWindow, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId,
    IsZoomed, MoveWindow, ShowWindow, SW_RESTORE,
};
use wintoolbox_core::{
    ForegroundQuery, PlatformError, Rect, WindowHandle, WindowIdentity, WindowOps,
};

/// `WindowOps` backed by user32.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32WindowOps;

impl ForegroundQuery for Win32WindowOps {
    fn foreground_window(&self) -> Option<WindowHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.is_invalid() {
            None
        } else {
            Some(handle_of(hwnd))
        }
    }
}

impl WindowOps for Win32WindowOps {
    fn is_maximized(&self, window: WindowHandle) -> bool {
        unsafe { IsZoomed(hwnd_of(window)).as_bool() }
    }

    fn restore_from_maximized(&self, window: WindowHandle) -> Result<(), PlatformError> {
        // Return value is the previous visibility, not an error
        unsafe {
            let _ = ShowWindow(hwnd_of(window), SW_RESTORE);
        }
        Ok(())
    }

    fn window_rect(&self, window: WindowHandle) -> Result<Rect, PlatformError> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd_of(window), &mut rect) }
            .map_err(|_| PlatformError::WindowGone(window))?;
        Ok(Rect::from_edges(rect.left, rect.top, rect.right, rect.bottom))
    }

    fn move_window(&self, window: WindowHandle, rect: Rect) -> Result<(), PlatformError> {
        unsafe {
            MoveWindow(
                hwnd_of(window),
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                true,
            )
        }
        .map_err(|e| api_error("MoveWindow", e))
    }

    fn window_identity(&self, window: WindowHandle) -> Result<WindowIdentity, PlatformError> {
        let hwnd = hwnd_of(window);

        let mut process_id = 0u32;
        let thread_id = unsafe { GetWindowThreadProcessId(hwnd, Some(&mut process_id)) };
        if thread_id == 0 {
            return Err(PlatformError::WindowGone(window));
        }

        let mut class_buf = [0u16; 256];
        let class_len = unsafe { GetClassNameW(hwnd, &mut class_buf) };
        if class_len <= 0 {
            return Err(PlatformError::WindowGone(window));
        }
        let class_name = String::from_utf16_lossy(&class_buf[..class_len as usize]);

        // An empty title is valid
        let mut title_buf = vec![0u16; title_capacity(unsafe { GetWindowTextLengthW(hwnd) })];
        let title_len = unsafe { GetWindowTextW(hwnd, &mut title_buf) };
        let title = utf16_prefix(&title_buf, title_len);

        Ok(WindowIdentity::new(process_id, class_name, title))
    }

    fn monitor_rect(&self, window: WindowHandle) -> Result<Rect, PlatformError> {
        let monitor = unsafe { MonitorFromWindow(hwnd_of(window), MONITOR_DEFAULTTONEAREST) };
        if monitor.is_invalid() {
            return Err(PlatformError::NoMonitor(window));
        }

        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        if !unsafe { GetMonitorInfoW(monitor, &mut info) }.as_bool() {
            return Err(PlatformError::NoMonitor(window));
        }

        let r = info.rcMonitor;
        Ok(Rect::from_edges(r.left, r.top, r.right, r.bottom))
    }
}

/// Buffer length for a title of `reported` UTF-16 units plus the terminator.
fn title_capacity(reported: i32) -> usize {
    reported.max(0) as usize + 1
}

/// Decode the first `copied` units of `buf`, clamped to the buffer.
fn utf16_prefix(buf: &[u16], copied: i32) -> String {
    let len = (copied.max(0) as usize).min(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_capacity_fits_long_titles() {
        assert_eq!(title_capacity(0), 1);
        assert_eq!(title_capacity(2000), 2001);
        assert_eq!(title_capacity(-1), 1);
    }

    #[test]
    fn test_long_title_is_not_truncated() {
        let long: String = "Ä".repeat(1500);
        let mut buf: Vec<u16> = vec![0; title_capacity(long.encode_utf16().count() as i32)];
        for (slot, unit) in buf.iter_mut().zip(long.encode_utf16()) {
            *slot = unit;
        }
        let copied = long.encode_utf16().count() as i32;

        assert_eq!(utf16_prefix(&buf, copied), long);
    }

    #[test]
    fn test_utf16_prefix_clamps() {
        let buf: Vec<u16> = "abc".encode_utf16().collect();
        assert_eq!(utf16_prefix(&buf, 0), "");
        assert_eq!(utf16_prefix(&buf, -5), "");
        assert_eq!(utf16_prefix(&buf, 10), "abc");
    }
}
