//! Console session
//!
//! Ties together the opened surface, the writer, and the reader worker.
//! The session is owned by the application thread that created it; lines
//! typed into the console reach that thread through its [`OwnerQueue`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::delivery::{LineDelivery, OwnerQueue};
use super::surface::{ConsoleWindow, SurfaceError, SurfaceProvider};
use super::worker::{ReaderWorker, WorkerState, DEFAULT_RETRY_BACKOFF};
use super::writer::{ConsoleWriter, LogLevel, PROMPT};
use crate::config::Config;
use crate::placement::{center_on_monitor, monitor_at, ConsolePositionMode, MonitorInfo, OwnerWindow};

/// File name used for persisted capture when none is configured
pub const CAPTURE_FILE_NAME: &str = "console.log";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Console surface unavailable: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Failed to spawn console reader: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Writer shared between the session and the owner's handlers
pub type SharedWriter = Arc<Mutex<ConsoleWriter>>;

/// Session start options
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Line written before the first prompt
    pub preface: Option<String>,
    /// Console window title
    pub title: Option<String>,
    /// Record everything written for persistence at teardown
    pub capture: bool,
    /// Where captured text is saved; defaults to [`CAPTURE_FILE_NAME`]
    /// beside the executable. `None` keeps the capture in memory only.
    pub capture_path: Option<PathBuf>,
    pub retry_backoff: Duration,
    /// Disable the console's native close button while the session runs
    pub lock_close: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            preface: None,
            title: None,
            capture: false,
            capture_path: default_capture_path(CAPTURE_FILE_NAME),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            lock_close: false,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            preface: config.preface.clone(),
            title: config.title.clone(),
            capture: config.capture.enabled,
            capture_path: default_capture_path(&config.capture.file_name),
            retry_backoff: Duration::from_millis(config.reader.retry_backoff_ms),
            lock_close: config.lock_close,
        }
    }
}

/// `<exe dir>/<file_name>`
pub fn default_capture_path(file_name: &str) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(file_name))
}

fn lock(writer: &Mutex<ConsoleWriter>) -> MutexGuard<'_, ConsoleWriter> {
    writer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live console attached to one owner
pub struct ConsoleSession {
    writer: SharedWriter,
    window: Box<dyn ConsoleWindow>,
    worker: ReaderWorker,
    capture_path: Option<PathBuf>,
    closed: bool,
}

impl ConsoleSession {
    /// Attach the surface, write the preface and first prompt, and start the
    /// reader. Attach failure is returned before any thread exists.
    pub fn start<P, D>(provider: &P, delivery: D, options: SessionOptions) -> Result<Self>
    where
        P: SurfaceProvider + ?Sized,
        D: LineDelivery,
    {
        let parts = provider.open_for_read_write()?;
        let mut window = parts.window;

        let mut writer = ConsoleWriter::new(parts.sink);
        writer.set_capture(options.capture);

        if let Some(title) = &options.title {
            window.set_title(title);
        }
        if options.lock_close {
            window.lock_close_control();
        }
        if let Some(preface) = &options.preface {
            writer.write_line(preface);
        }
        writer.write(PROMPT);

        let worker = match ReaderWorker::spawn(parts.source, delivery, options.retry_backoff) {
            Ok(worker) => worker,
            Err(e) => {
                window.release();
                return Err(SessionError::Spawn(e));
            }
        };

        info!("Console session started");
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            window,
            worker,
            capture_path: options.capture_path,
            closed: false,
        })
    }

    /// Start with a fresh owner queue for the calling thread
    pub fn start_with_queue<P>(provider: &P, options: SessionOptions) -> Result<(Self, OwnerQueue)>
    where
        P: SurfaceProvider + ?Sized,
    {
        let (tx, queue) = OwnerQueue::new();
        let session = Self::start(provider, tx, options)?;
        Ok((session, queue))
    }

    /// Writer handle for use inside input handlers
    pub fn writer(&self) -> SharedWriter {
        self.writer.clone()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    pub fn request_stop(&self) {
        self.worker.request_stop();
    }

    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        self.worker.wait_stopped(timeout)
    }

    pub fn write(&self, text: &str) {
        lock(&self.writer).write(text);
    }

    pub fn write_line(&self, text: &str) {
        lock(&self.writer).write_line(text);
    }

    pub fn set_blocked(&self, blocked: bool) {
        lock(&self.writer).set_blocked(blocked);
    }

    pub fn is_blocked(&self) -> bool {
        lock(&self.writer).is_blocked()
    }

    pub fn set_capture(&self, enabled: bool) {
        lock(&self.writer).set_capture(enabled);
    }

    pub fn captured_text(&self) -> String {
        lock(&self.writer).captured_text().to_string()
    }

    pub fn prompted_write(&self, message: &str, with_prefix_colon: bool, with_trailing_prompt: bool) {
        lock(&self.writer).prompted_write(message, with_prefix_colon, with_trailing_prompt);
    }

    pub fn log_entry(&self, level: LogLevel, message: &str) {
        lock(&self.writer).log_entry(level, message);
    }

    pub fn notice(&self, message: &str, extra: Option<&str>) {
        lock(&self.writer).notice(message, extra);
    }

    pub fn warning(&self, message: &str, extra: Option<&str>) {
        lock(&self.writer).warning(message, extra);
    }

    pub fn error(&self, message: &str, extra: Option<&str>) {
        lock(&self.writer).error(message, extra);
    }

    pub fn info(&self, message: &str, extra: Option<&str>) {
        lock(&self.writer).info(message, extra);
    }

    pub fn debug(&self, message: &str, extra: Option<&str>) {
        lock(&self.writer).debug(message, extra);
    }

    pub fn log(&self, message: &str, extra: Option<&str>) {
        lock(&self.writer).log(message, extra);
    }

    pub fn show(&mut self) {
        self.window.show();
    }

    pub fn hide(&mut self) {
        self.window.hide();
    }

    pub fn bring_to_foreground(&mut self) {
        self.window.bring_to_foreground();
    }

    pub fn lock_close_control(&mut self) {
        self.window.lock_close_control();
    }

    pub fn unlock_close_control(&mut self) {
        self.window.unlock_close_control();
    }

    /// Show centered on the monitor holding `owner`
    pub fn show_on_owner(&mut self, owner: OwnerWindow) {
        self.show_with(ConsolePositionMode::FollowOwnerWindow, Some(owner), 0);
    }

    pub fn show_with(&mut self, mode: ConsolePositionMode, owner: Option<OwnerWindow>, monitor_index: usize) {
        let target = match mode {
            ConsolePositionMode::Default => None,
            ConsolePositionMode::FollowOwnerWindow => {
                owner.and_then(|o| self.window.monitor_for_owner(o))
            }
            ConsolePositionMode::SpecificMonitor => {
                let monitors = self.window.monitors();
                monitor_at(&monitors, monitor_index).copied()
            }
        };
        if let Some(monitor) = target {
            self.center_on(&monitor);
        }
        self.window.show();
    }

    fn center_on(&mut self, monitor: &MonitorInfo) {
        match self.window.window_size() {
            Some(size) => self.window.move_to(center_on_monitor(monitor, size)),
            None => debug!("Console window size unknown; showing in place"),
        }
    }

    /// Tear the session down. Equivalent to dropping it.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Surface goes first so a blocked read fails and the worker can exit
        self.window.release();
        self.worker.request_stop();
        let _ = self.worker.wait_stopped(Duration::from_millis(50));
        if !self.worker.join_if_finished() {
            debug!("Console reader not yet stopped at teardown");
        }

        let captured = {
            let mut writer = lock(&self.writer);
            if writer.is_capturing() {
                writer.take_captured()
            } else {
                String::new()
            }
        };
        if !captured.is_empty() {
            if let Some(path) = &self.capture_path {
                persist_capture(path, &captured);
            }
        }
        info!("Console session closed");
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn persist_capture(path: &Path, text: &str) {
    if let Err(e) = fs::write(path, text) {
        warn!("Failed to save console capture to {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scripted::{ScriptedSurface, WindowEvent};
    use crate::placement::{Point, Rect, Size};
    use pretty_assertions::assert_eq;
    use std::thread;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(5);

    fn monitor(x: i32, y: i32, w: i32, h: i32) -> MonitorInfo {
        MonitorInfo {
            bounds: Rect::new(x, y, w, h),
            work_area: Rect::new(x, y, w, h),
        }
    }

    #[test]
    fn test_attach_failure_is_synchronous() {
        let surface = ScriptedSurface::failing();
        let result = ConsoleSession::start_with_queue(&surface, SessionOptions::default());
        assert!(matches!(result, Err(SessionError::Surface(SurfaceError::Attach(_)))));
        assert!(surface.output().is_empty());
    }

    #[test]
    fn test_start_writes_preface_and_prompt() {
        let surface = ScriptedSurface::new();
        let options = SessionOptions {
            preface: Some("Console ready".into()),
            title: Some("conbridge".into()),
            lock_close: true,
            ..SessionOptions::default()
        };
        let (session, _queue) = ConsoleSession::start_with_queue(&surface, options).unwrap();

        assert_eq!(session.worker_state(), WorkerState::Running);
        assert!(surface.output().starts_with("Console ready"));
        assert!(surface.output().ends_with(PROMPT));
        assert_eq!(
            surface.events(),
            vec![WindowEvent::Title("conbridge".into()), WindowEvent::LockClose]
        );
    }

    #[test]
    fn test_handler_can_reply_through_writer() {
        let surface = ScriptedSurface::new();
        let (session, mut queue) = ConsoleSession::start_with_queue(&surface, SessionOptions::default()).unwrap();
        let writer = session.writer();

        surface.push_line("ping\r\n");
        let deadline = Instant::now() + WAIT;
        let mut handled = 0;
        while handled == 0 && Instant::now() < deadline {
            handled += queue.pump(&mut |line: &str| {
                writer.lock().unwrap().prompted_write(&format!("echo {}", line), true, true);
            });
            thread::sleep(Duration::from_millis(2));
        }
        assert!(surface.output().contains(": echo ping"));
    }

    #[test]
    fn test_teardown_releases_surface_and_stops_worker() {
        let surface = ScriptedSurface::new();
        let (session, mut queue) = ConsoleSession::start_with_queue(&surface, SessionOptions::default()).unwrap();
        session.close();

        assert!(surface.is_released());
        assert_eq!(surface.events().last(), Some(&WindowEvent::Release));
        // Worker exits and drops its sender
        let deadline = Instant::now() + WAIT;
        while !queue.is_disconnected() && Instant::now() < deadline {
            queue.pump_timeout(&mut |_: &str| {}, Duration::from_millis(10));
        }
        assert!(queue.is_disconnected());
    }

    #[test]
    fn test_capture_persisted_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CAPTURE_FILE_NAME);
        let surface = ScriptedSurface::new();
        let options = SessionOptions {
            capture: true,
            capture_path: Some(path.clone()),
            ..SessionOptions::default()
        };
        let (session, _queue) = ConsoleSession::start_with_queue(&surface, options).unwrap();
        session.set_blocked(true);
        session.write("hidden but kept");
        session.close();

        let saved = fs::read_to_string(&path).unwrap();
        assert_eq!(saved, format!("{}hidden but kept", PROMPT));
        assert!(!surface.output().contains("hidden"));
    }

    #[test]
    fn test_default_options_persist_beside_executable() {
        let expected = std::env::current_exe().unwrap().parent().unwrap().join(CAPTURE_FILE_NAME);
        assert_eq!(SessionOptions::default().capture_path, Some(expected.clone()));

        let surface = ScriptedSurface::new();
        let options = SessionOptions {
            capture: true,
            ..SessionOptions::default()
        };
        let (session, _queue) = ConsoleSession::start_with_queue(&surface, options).unwrap();
        session.write("keep me");
        session.close();

        let saved = fs::read_to_string(&expected).unwrap();
        let _ = fs::remove_file(&expected);
        assert_eq!(saved, format!("{}keep me", PROMPT));
    }

    #[test]
    fn test_capture_not_persisted_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CAPTURE_FILE_NAME);
        let surface = ScriptedSurface::new();
        let options = SessionOptions {
            capture_path: Some(path.clone()),
            ..SessionOptions::default()
        };
        let (session, _queue) = ConsoleSession::start_with_queue(&surface, options).unwrap();
        session.write("text");
        drop(session);
        assert!(!path.exists());
    }

    #[test]
    fn test_capture_persist_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let surface = ScriptedSurface::new();
        let options = SessionOptions {
            capture: true,
            // A directory cannot be written as a file
            capture_path: Some(dir.path().to_path_buf()),
            ..SessionOptions::default()
        };
        let (session, _queue) = ConsoleSession::start_with_queue(&surface, options).unwrap();
        session.write("lost");
        session.close();
        assert!(surface.is_released());
    }

    #[test]
    fn test_writes_after_invalid_handle_are_best_effort() {
        let surface = ScriptedSurface::new();
        let (session, _queue) = ConsoleSession::start_with_queue(&surface, SessionOptions::default()).unwrap();
        surface.invalidate();
        assert!(session.wait_stopped(WAIT));
        session.error("disk full", None);
        session.write_line("nobody sees this");
    }

    #[test]
    fn test_show_follow_owner_window() {
        let surface = ScriptedSurface::new();
        surface.set_window_size(Size::new(400, 300));
        surface.place_owner(
            OwnerWindow(42),
            MonitorInfo {
                bounds: Rect::new(0, 0, 1200, 1000),
                work_area: Rect::new(100, 100, 1000, 800),
            },
        );
        let (mut session, _queue) = ConsoleSession::start_with_queue(&surface, SessionOptions::default()).unwrap();
        session.show_on_owner(OwnerWindow(42));

        assert_eq!(
            surface.events(),
            vec![WindowEvent::MoveTo(Point::new(400, 350)), WindowEvent::Show]
        );
    }

    #[test]
    fn test_show_specific_monitor_falls_back_to_first() {
        let surface = ScriptedSurface::new();
        surface.set_window_size(Size::new(200, 100));
        surface.set_monitors(vec![monitor(0, 0, 1000, 500), monitor(1000, 0, 1000, 500)]);
        let (mut session, _queue) = ConsoleSession::start_with_queue(&surface, SessionOptions::default()).unwrap();

        session.show_with(ConsolePositionMode::SpecificMonitor, None, 1);
        session.show_with(ConsolePositionMode::SpecificMonitor, None, 9);
        session.show_with(ConsolePositionMode::Default, Some(OwnerWindow(1)), 0);

        assert_eq!(
            surface.events(),
            vec![
                WindowEvent::MoveTo(Point::new(1400, 200)),
                WindowEvent::Show,
                WindowEvent::MoveTo(Point::new(400, 200)),
                WindowEvent::Show,
                WindowEvent::Show,
            ]
        );
    }

    #[test]
    fn test_window_controls_forwarded() {
        let surface = ScriptedSurface::new();
        let (mut session, _queue) = ConsoleSession::start_with_queue(&surface, SessionOptions::default()).unwrap();
        session.hide();
        session.show();
        session.bring_to_foreground();
        session.lock_close_control();
        session.unlock_close_control();
        // Unknown owner: no move, plain show
        session.show_on_owner(OwnerWindow(7));

        assert_eq!(
            surface.events(),
            vec![
                WindowEvent::Hide,
                WindowEvent::Show,
                WindowEvent::Foreground,
                WindowEvent::LockClose,
                WindowEvent::UnlockClose,
                WindowEvent::Show,
            ]
        );
    }
}
