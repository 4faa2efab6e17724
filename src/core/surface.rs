//! Console surface capabilities
//!
//! A surface is split into three parts when it is opened: the input side
//! handed to the reader worker, the output side owned by the writer, and the
//! window controls kept by the session.

use std::io;
use thiserror::Error;

use crate::placement::{MonitorInfo, OwnerWindow, Point, Size};

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Failed to attach console: {0}")]
    Attach(String),

    #[error("Failed to open console stream: {0}")]
    Open(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, SurfaceError>;

/// Result of one blocking read
#[derive(Debug)]
pub enum ReadOutcome {
    /// A completed line, still carrying its line terminator
    Line(String),
    /// The input handle is gone for good
    Invalid,
    /// The read failed but the handle is still usable
    Transient(io::Error),
}

impl ReadOutcome {
    /// Map an io error onto the permanent/transient split
    pub fn from_io_error(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                ReadOutcome::Transient(err)
            }
            _ => ReadOutcome::Invalid,
        }
    }
}

/// Input side of a console
pub trait LineSource: Send {
    /// Block until a full line arrives or the handle is invalidated
    fn read_line(&mut self) -> ReadOutcome;
}

/// Output side of a console
pub trait TextSink: Send {
    fn write_raw(&mut self, text: &str) -> io::Result<()>;
}

/// Window-level controls over the console's visual representation.
///
/// Surfaces without a native window implement these as no-ops and report
/// no size or monitors, which makes every placement request a plain show.
pub trait ConsoleWindow: Send {
    fn show(&mut self);
    fn hide(&mut self);
    fn bring_to_foreground(&mut self);
    fn lock_close_control(&mut self);
    fn unlock_close_control(&mut self);

    /// Outer size of the console window in pixels
    fn window_size(&self) -> Option<Size>;
    fn move_to(&mut self, top_left: Point);

    /// All monitors in enumeration order
    fn monitors(&self) -> Vec<MonitorInfo>;
    /// Monitor containing the given owner window
    fn monitor_for_owner(&self, owner: OwnerWindow) -> Option<MonitorInfo>;

    fn set_title(&mut self, _title: &str) {}

    /// Tear the surface down. Outstanding reads should fail with an invalid
    /// handle afterwards.
    fn release(&mut self);
}

/// The three halves of an opened surface
pub struct SurfaceParts {
    pub source: Box<dyn LineSource>,
    pub sink: Box<dyn TextSink>,
    pub window: Box<dyn ConsoleWindow>,
}

/// Something that can attach to (or create) an interactive console
pub trait SurfaceProvider {
    fn open_for_read_write(&self) -> Result<SurfaceParts>;
}

/// Strip every trailing CR and LF from a raw line
pub fn strip_line_ending(raw: &str) -> &str {
    raw.trim_end_matches(['\r', '\n'])
}

/// Assembles lines from UTF-16 console reads.
///
/// A long line may arrive over several reads, and one read may carry more
/// than one line. Text is decoded only once a whole line is buffered, so a
/// surrogate pair split across reads survives.
#[derive(Debug, Default)]
pub struct WideLineBuffer {
    pending: Vec<u16>,
}

impl WideLineBuffer {
    const LF: u16 = b'\n' as u16;

    pub fn new() -> Self {
        Self::default()
    }

    /// Next complete line already buffered, terminator included
    pub fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&u| u == Self::LF)? + 1;
        let line: Vec<u16> = self.pending.drain(..end).collect();
        Some(String::from_utf16_lossy(&line))
    }

    /// Feed one read's units and return a line if one completed.
    ///
    /// A successful read of zero units with nothing buffered (Ctrl+C at an
    /// empty prompt) is an empty line, not a closed handle.
    pub fn feed(&mut self, units: &[u16]) -> Option<String> {
        if units.is_empty() {
            return self.pending.is_empty().then(String::new);
        }
        self.pending.extend_from_slice(units);
        self.take_line()
    }
}
