//! In-memory console surface
//!
//! [`ScriptedSurface`] stands in for a real console: input is pushed from the
//! controlling side, output and window calls are recorded for inspection.
//! Clones share the same state, so a test keeps one clone while the session
//! owns the parts opened from another.
//!
//! ```
//! use conbridge::core::scripted::ScriptedSurface;
//! use conbridge::core::session::{ConsoleSession, SessionOptions};
//! use std::time::Duration;
//!
//! let surface = ScriptedSurface::new();
//! let (session, mut queue) = ConsoleSession::start_with_queue(&surface, SessionOptions::default()).unwrap();
//!
//! surface.push_line("hello\r\n");
//! let mut seen = Vec::new();
//! while seen.is_empty() {
//!     queue.pump_timeout(&mut |line: &str| seen.push(line.to_string()), Duration::from_millis(10));
//! }
//! assert_eq!(seen, ["hello"]);
//! drop(session);
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::surface::{
    ConsoleWindow, LineSource, ReadOutcome, Result, SurfaceError, SurfaceParts, SurfaceProvider,
    TextSink,
};
use crate::placement::{MonitorInfo, OwnerWindow, Point, Size};

/// A recorded window-control call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Show,
    Hide,
    Foreground,
    LockClose,
    UnlockClose,
    MoveTo(Point),
    Title(String),
    Release,
}

enum Input {
    Line(String),
    Transient,
    Invalid,
}

#[derive(Default)]
struct Geometry {
    window_size: Option<Size>,
    monitors: Vec<MonitorInfo>,
    owner_monitors: Vec<(OwnerWindow, MonitorInfo)>,
}

#[derive(Default)]
struct State {
    input: VecDeque<Input>,
    /// Readers parked with no input queued
    waiting_readers: usize,
    released: bool,
    output: String,
    events: Vec<WindowEvent>,
    geometry: Geometry,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    input_ready: Condvar,
    reader_parked: Condvar,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulated console surface
#[derive(Clone, Default)]
pub struct ScriptedSurface {
    inner: Arc<Inner>,
    fail_attach: bool,
}

impl ScriptedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface whose attach always fails
    pub fn failing() -> Self {
        Self {
            fail_attach: true,
            ..Self::default()
        }
    }

    /// Queue a raw line; include the terminator the console would produce
    pub fn push_line(&self, raw: &str) {
        self.push(Input::Line(raw.to_string()));
    }

    /// Queue one read that fails without invalidating the handle
    pub fn push_transient(&self) {
        self.push(Input::Transient);
    }

    /// Queue a permanent invalid-handle result after any pending lines
    pub fn invalidate(&self) {
        self.push(Input::Invalid);
    }

    fn push(&self, input: Input) {
        self.inner.lock().input.push_back(input);
        self.inner.input_ready.notify_all();
    }

    /// Block until a reader is parked waiting for input, or the timeout
    /// passes. Returns whether a reader is parked.
    pub fn wait_for_blocked_reader(&self, timeout: Duration) -> bool {
        let state = self.inner.lock();
        let (state, _) = self
            .inner
            .reader_parked
            .wait_timeout_while(state, timeout, |s| s.waiting_readers == 0)
            .unwrap_or_else(PoisonError::into_inner);
        state.waiting_readers > 0
    }

    pub fn output(&self) -> String {
        self.inner.lock().output.clone()
    }

    pub fn events(&self) -> Vec<WindowEvent> {
        self.inner.lock().events.clone()
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    pub fn set_window_size(&self, size: Size) {
        self.inner.lock().geometry.window_size = Some(size);
    }

    pub fn set_monitors(&self, monitors: Vec<MonitorInfo>) {
        self.inner.lock().geometry.monitors = monitors;
    }

    pub fn place_owner(&self, owner: OwnerWindow, monitor: MonitorInfo) {
        self.inner.lock().geometry.owner_monitors.push((owner, monitor));
    }
}

impl SurfaceProvider for ScriptedSurface {
    fn open_for_read_write(&self) -> Result<SurfaceParts> {
        if self.fail_attach {
            return Err(SurfaceError::Attach("scripted attach failure".to_string()));
        }
        Ok(SurfaceParts {
            source: Box::new(ScriptedSource(self.inner.clone())),
            sink: Box::new(ScriptedSink(self.inner.clone())),
            window: Box::new(ScriptedWindow(self.inner.clone())),
        })
    }
}

struct ScriptedSource(Arc<Inner>);

impl LineSource for ScriptedSource {
    fn read_line(&mut self) -> ReadOutcome {
        let mut state = self.0.lock();
        loop {
            if state.released {
                return ReadOutcome::Invalid;
            }
            match state.input.pop_front() {
                Some(Input::Line(raw)) => return ReadOutcome::Line(raw),
                Some(Input::Transient) => {
                    return ReadOutcome::Transient(io::Error::from(io::ErrorKind::Interrupted))
                }
                Some(Input::Invalid) => {
                    state.released = true;
                    return ReadOutcome::Invalid;
                }
                None => {
                    state.waiting_readers += 1;
                    self.0.reader_parked.notify_all();
                    state = self
                        .0
                        .input_ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                    state.waiting_readers -= 1;
                }
            }
        }
    }
}

struct ScriptedSink(Arc<Inner>);

impl TextSink for ScriptedSink {
    fn write_raw(&mut self, text: &str) -> io::Result<()> {
        let mut state = self.0.lock();
        if state.released {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        state.output.push_str(text);
        Ok(())
    }
}

struct ScriptedWindow(Arc<Inner>);

impl ScriptedWindow {
    fn record(&self, event: WindowEvent) {
        self.0.lock().events.push(event);
    }
}

impl ConsoleWindow for ScriptedWindow {
    fn show(&mut self) {
        self.record(WindowEvent::Show);
    }

    fn hide(&mut self) {
        self.record(WindowEvent::Hide);
    }

    fn bring_to_foreground(&mut self) {
        self.record(WindowEvent::Foreground);
    }

    fn lock_close_control(&mut self) {
        self.record(WindowEvent::LockClose);
    }

    fn unlock_close_control(&mut self) {
        self.record(WindowEvent::UnlockClose);
    }

    fn window_size(&self) -> Option<Size> {
        self.0.lock().geometry.window_size
    }

    fn move_to(&mut self, top_left: Point) {
        self.record(WindowEvent::MoveTo(top_left));
    }

    fn monitors(&self) -> Vec<MonitorInfo> {
        self.0.lock().geometry.monitors.clone()
    }

    fn monitor_for_owner(&self, owner: OwnerWindow) -> Option<MonitorInfo> {
        self.0
            .lock()
            .geometry
            .owner_monitors
            .iter()
            .find(|(o, _)| *o == owner)
            .map(|(_, m)| *m)
    }

    fn set_title(&mut self, title: &str) {
        self.record(WindowEvent::Title(title.to_string()));
    }

    fn release(&mut self) {
        {
            let mut state = self.0.lock();
            state.released = true;
            state.events.push(WindowEvent::Release);
        }
        self.0.input_ready.notify_all();
    }
}
