//! Windows console surface
//!
//! Allocates a console for the process when it has none, opens `CONIN$` and
//! `CONOUT$`, and drives the console window through Win32.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::windows::io::AsRawHandle;
use std::sync::Arc;

use tracing::debug;
use windows::core::HSTRING;
use windows::Win32::Foundation::{BOOL, HANDLE, HWND, LPARAM, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, MonitorFromWindow, HDC, HMONITOR, MONITORINFO,
    MONITOR_DEFAULTTONEAREST,
};
use windows::Win32::System::Console::{
    AllocConsole, FreeConsole, GetConsoleWindow, ReadConsoleW, SetConsoleOutputCP,
    SetConsoleTitleW,
};
use windows::Win32::System::IO::CancelIoEx;
use windows::Win32::UI::WindowsAndMessaging::{
    EnableMenuItem, GetSystemMenu, GetWindowRect, SetForegroundWindow, SetWindowPos, ShowWindow,
    MF_BYCOMMAND, MF_ENABLED, MF_GRAYED, SC_CLOSE, SWP_NOACTIVATE, SWP_NOSIZE, SWP_NOZORDER,
    SW_HIDE, SW_SHOW,
};

use super::surface::{
    ConsoleWindow, LineSource, ReadOutcome, Result, SurfaceError, SurfaceParts, SurfaceProvider,
    TextSink, WideLineBuffer,
};
use crate::placement::{MonitorInfo, OwnerWindow, Point, Rect, Size};

const CP_UTF8: u32 = 65001;

/// UTF-16 units requested per console read
const READ_CHUNK: usize = 1024;

/// The process console, allocated on demand
#[derive(Debug, Default, Clone, Copy)]
pub struct WinConsole;

impl SurfaceProvider for WinConsole {
    fn open_for_read_write(&self) -> Result<SurfaceParts> {
        unsafe {
            if GetConsoleWindow().is_invalid() {
                AllocConsole().map_err(|e| SurfaceError::Attach(e.to_string()))?;
            }
        }

        let input = OpenOptions::new()
            .read(true)
            .write(true)
            .open("CONIN$")
            .map_err(SurfaceError::Open)?;
        let output = OpenOptions::new()
            .read(true)
            .write(true)
            .open("CONOUT$")
            .map_err(SurfaceError::Open)?;

        let hwnd = unsafe { GetConsoleWindow() };
        if hwnd.is_invalid() {
            return Err(SurfaceError::Attach("console has no window".to_string()));
        }

        // Output is written as UTF-8 bytes
        if let Err(e) = unsafe { SetConsoleOutputCP(CP_UTF8) } {
            debug!("SetConsoleOutputCP failed: {}", e);
        }

        // Shared so the window can cancel a pending read on a handle that
        // is still open, whichever side drops last
        let input = Arc::new(input);
        Ok(SurfaceParts {
            source: Box::new(ConinSource {
                input: input.clone(),
                lines: WideLineBuffer::new(),
            }),
            sink: Box::new(ConoutSink { file: output }),
            window: Box::new(WinWindow { hwnd, input }),
        })
    }
}

/// Reads `CONIN$` as UTF-16 so typed text does not depend on the input codepage
struct ConinSource {
    input: Arc<File>,
    lines: WideLineBuffer,
}

impl LineSource for ConinSource {
    fn read_line(&mut self) -> ReadOutcome {
        if let Some(line) = self.lines.take_line() {
            return ReadOutcome::Line(line);
        }
        let handle = HANDLE(self.input.as_raw_handle());
        let mut buf = [0u16; READ_CHUNK];
        loop {
            let mut read = 0u32;
            let result = unsafe {
                ReadConsoleW(
                    handle,
                    buf.as_mut_ptr().cast(),
                    buf.len() as u32,
                    &mut read,
                    None,
                )
            };
            if let Err(e) = result {
                // ERROR_INVALID_HANDLE and ERROR_OPERATION_ABORTED both classify as permanent
                return ReadOutcome::from_io_error(io::Error::from(e));
            }
            if let Some(line) = self.lines.feed(&buf[..read as usize]) {
                return ReadOutcome::Line(line);
            }
        }
    }
}

struct ConoutSink {
    file: File,
}

impl TextSink for ConoutSink {
    fn write_raw(&mut self, text: &str) -> io::Result<()> {
        self.file.write_all(text.as_bytes())?;
        self.file.flush()
    }
}

struct WinWindow {
    hwnd: HWND,
    input: Arc<File>,
}

// Safety: the window and console handles are process-wide and usable from any thread
unsafe impl Send for WinWindow {}

impl WinWindow {
    fn set_close_enabled(&self, enabled: bool) {
        let flags = if enabled { MF_ENABLED } else { MF_GRAYED };
        unsafe {
            let menu = GetSystemMenu(self.hwnd, false);
            if !menu.is_invalid() {
                let _ = EnableMenuItem(menu, SC_CLOSE, MF_BYCOMMAND | flags);
            }
        }
    }
}

fn to_rect(r: &RECT) -> Rect {
    Rect::new(r.left, r.top, r.right - r.left, r.bottom - r.top)
}

fn monitor_info(monitor: HMONITOR) -> Option<MonitorInfo> {
    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    unsafe {
        if !GetMonitorInfoW(monitor, &mut info).as_bool() {
            return None;
        }
    }
    Some(MonitorInfo {
        bounds: to_rect(&info.rcMonitor),
        work_area: to_rect(&info.rcWork),
    })
}

unsafe extern "system" fn collect_monitor(
    monitor: HMONITOR,
    _hdc: HDC,
    _clip: *mut RECT,
    data: LPARAM,
) -> BOOL {
    let monitors = &mut *(data.0 as *mut Vec<MonitorInfo>);
    if let Some(info) = monitor_info(monitor) {
        monitors.push(info);
    }
    TRUE
}

impl ConsoleWindow for WinWindow {
    fn show(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOW);
        }
    }

    fn hide(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
        }
    }

    fn bring_to_foreground(&mut self) {
        unsafe {
            let _ = SetForegroundWindow(self.hwnd);
        }
    }

    fn lock_close_control(&mut self) {
        self.set_close_enabled(false);
    }

    fn unlock_close_control(&mut self) {
        self.set_close_enabled(true);
    }

    fn window_size(&self) -> Option<Size> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(self.hwnd, &mut rect).ok()? };
        let r = to_rect(&rect);
        Some(r.size)
    }

    fn move_to(&mut self, top_left: Point) {
        unsafe {
            if let Err(e) = SetWindowPos(
                self.hwnd,
                HWND::default(),
                top_left.x,
                top_left.y,
                0,
                0,
                SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE,
            ) {
                debug!("SetWindowPos failed: {}", e);
            }
        }
    }

    fn monitors(&self) -> Vec<MonitorInfo> {
        let mut monitors: Vec<MonitorInfo> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(collect_monitor),
                LPARAM(&mut monitors as *mut Vec<MonitorInfo> as isize),
            );
        }
        monitors
    }

    fn monitor_for_owner(&self, owner: OwnerWindow) -> Option<MonitorInfo> {
        let hwnd = HWND(owner.0 as *mut std::ffi::c_void);
        let monitor = unsafe { MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST) };
        if monitor.is_invalid() {
            return None;
        }
        monitor_info(monitor)
    }

    fn set_title(&mut self, title: &str) {
        unsafe {
            let _ = SetConsoleTitleW(&HSTRING::from(title));
        }
    }

    fn release(&mut self) {
        unsafe {
            // Unblock a pending ReadFile on CONIN$, then detach
            let _ = CancelIoEx(HANDLE(self.input.as_raw_handle()), None);
            let _ = FreeConsole();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Foundation::GetHandleInformation;

    #[test]
    fn test_window_keeps_input_handle_open_after_source_drops() {
        let file = tempfile::tempfile().unwrap();
        let input = Arc::new(file);
        let raw = HANDLE(input.as_raw_handle());

        let source = ConinSource {
            input: input.clone(),
            lines: WideLineBuffer::new(),
        };
        let window = WinWindow {
            hwnd: HWND::default(),
            input,
        };

        // The reader exits and drops its side first
        drop(source);

        let mut flags = 0u32;
        assert!(unsafe { GetHandleInformation(raw, &mut flags) }.is_ok());
        assert_eq!(HANDLE(window.input.as_raw_handle()), raw);
    }
}
