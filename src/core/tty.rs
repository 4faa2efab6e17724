//! Stdio console surface
//!
//! Reads lines from stdin and writes to stdout. There is no native window
//! behind a plain terminal, so window controls only log, and placement
//! requests degrade to a plain show. The title goes through crossterm.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossterm::execute;
use crossterm::terminal::SetTitle;
use tracing::debug;

use super::surface::{
    ConsoleWindow, LineSource, ReadOutcome, Result, SurfaceParts, SurfaceProvider, TextSink,
};
use crate::placement::{MonitorInfo, OwnerWindow, Point, Size};

/// The process's own stdin/stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct TtySurface;

impl SurfaceProvider for TtySurface {
    fn open_for_read_write(&self) -> Result<SurfaceParts> {
        let released = Arc::new(AtomicBool::new(false));
        Ok(SurfaceParts {
            source: Box::new(StdinSource {
                released: released.clone(),
            }),
            sink: Box::new(StdoutSink {
                released: released.clone(),
            }),
            window: Box::new(TtyWindow { released }),
        })
    }
}

struct StdinSource {
    released: Arc<AtomicBool>,
}

impl LineSource for StdinSource {
    fn read_line(&mut self) -> ReadOutcome {
        if self.released.load(Ordering::SeqCst) {
            return ReadOutcome::Invalid;
        }
        read_one_line(&mut io::stdin().lock())
    }
}

/// Read up to and including the next LF. End of stream is a closed handle.
pub(crate) fn read_one_line<R: BufRead>(reader: &mut R) -> ReadOutcome {
    let mut buf = Vec::new();
    match reader.read_until(b'\n', &mut buf) {
        Ok(0) => ReadOutcome::Invalid,
        Ok(_) => ReadOutcome::Line(String::from_utf8_lossy(&buf).into_owned()),
        Err(e) => ReadOutcome::from_io_error(e),
    }
}

struct StdoutSink {
    released: Arc<AtomicBool>,
}

impl TextSink for StdoutSink {
    fn write_raw(&mut self, text: &str) -> io::Result<()> {
        if self.released.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }
}

struct TtyWindow {
    released: Arc<AtomicBool>,
}

impl ConsoleWindow for TtyWindow {
    fn show(&mut self) {
        debug!("show: terminal has no native window");
    }

    fn hide(&mut self) {
        debug!("hide: terminal has no native window");
    }

    fn bring_to_foreground(&mut self) {}

    fn lock_close_control(&mut self) {}

    fn unlock_close_control(&mut self) {}

    fn window_size(&self) -> Option<Size> {
        None
    }

    fn move_to(&mut self, _top_left: Point) {}

    fn monitors(&self) -> Vec<MonitorInfo> {
        Vec::new()
    }

    fn monitor_for_owner(&self, _owner: OwnerWindow) -> Option<MonitorInfo> {
        None
    }

    fn set_title(&mut self, title: &str) {
        let _ = execute!(io::stdout(), SetTitle(title));
    }

    fn release(&mut self) {
        // A read already blocked on stdin stays blocked until input or EOF
        self.released.store(true, Ordering::SeqCst);
    }
}
