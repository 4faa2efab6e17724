//! Console reader worker
//!
//! A dedicated thread that blocks on the surface's input and hands every
//! completed line to the owner through a [`LineDelivery`].
//!
//! # States
//!
//! ```text
//! Created ──spawn──> Running ──invalid handle / stop / owner gone──> Terminating ──> Stopped
//!                      │  ▲
//!                      └──┘ transient failure: back off, retry
//! ```
//!
//! A stop request is cooperative. The flag is checked between reads, so a
//! read already blocked on the surface keeps the worker alive until that read
//! completes or the surface invalidates the handle.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::delivery::LineDelivery;
use super::surface::{strip_line_ending, LineSource, ReadOutcome};

/// Delay before retrying after a transient read failure
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Created = 0,
    Running = 1,
    Terminating = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Created,
            1 => WorkerState::Running,
            2 => WorkerState::Terminating,
            _ => WorkerState::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Created => "created",
            WorkerState::Running => "running",
            WorkerState::Terminating => "terminating",
            WorkerState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State shared between the worker thread and its controller
struct Shared {
    stop: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

/// Handle to the reader thread
pub struct ReaderWorker {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl ReaderWorker {
    /// Spawn the reader thread. The worker is `Running` once this returns.
    pub fn spawn<D: LineDelivery>(
        source: Box<dyn LineSource>,
        delivery: D,
        retry_backoff: Duration,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Created as u8),
        });

        let thread_shared = shared.clone();
        shared.set_state(WorkerState::Running);
        let thread = thread::Builder::new()
            .name("console-reader".to_string())
            .spawn(move || {
                run_loop(source, delivery, retry_backoff, &thread_shared);
            });

        match thread {
            Ok(handle) => Ok(Self {
                shared,
                thread: Some(handle),
            }),
            Err(e) => {
                shared.set_state(WorkerState::Stopped);
                Err(e)
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// Ask the loop to exit at its next iteration boundary
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.state() == WorkerState::Stopped
    }

    /// Poll until the worker reaches `Stopped` or `timeout` elapses
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Join the thread if it has already stopped. A worker still blocked on
    /// a read is detached instead.
    pub fn join_if_finished(&mut self) -> bool {
        if !self.is_finished() {
            return false;
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        true
    }
}

impl Drop for ReaderWorker {
    fn drop(&mut self) {
        self.request_stop();
        if !self.join_if_finished() {
            debug!("Console reader still blocked on input; detaching");
        }
    }
}

fn run_loop<D: LineDelivery>(
    mut source: Box<dyn LineSource>,
    delivery: D,
    retry_backoff: Duration,
    shared: &Shared,
) {
    info!("Console reader started");

    loop {
        if shared.stop.load(Ordering::SeqCst) {
            debug!("Console reader stop requested");
            break;
        }

        match source.read_line() {
            ReadOutcome::Line(raw) => {
                let line = strip_line_ending(&raw).to_string();
                if delivery.deliver(line).is_err() {
                    info!("Console owner queue closed; stopping reader");
                    break;
                }
            }
            ReadOutcome::Invalid => {
                info!("Console input handle invalid; stopping reader");
                break;
            }
            ReadOutcome::Transient(e) => {
                warn!("Transient console read failure: {}", e);
                thread::sleep(retry_backoff);
            }
        }
    }

    shared.set_state(WorkerState::Terminating);
    drop(source);
    shared.set_state(WorkerState::Stopped);
    info!("Console reader stopped");
}
