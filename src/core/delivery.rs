//! Cross-context line delivery
//!
//! The reader worker never runs the owner's handler. It hands each line to a
//! [`LineDelivery`], and the owner drains its [`OwnerQueue`] on its own thread,
//! one line at a time, in the order the lines were read.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Receives completed console lines on the owner's execution context
pub trait InputHandler {
    fn on_console_line(&mut self, line: &str);
}

impl<F: FnMut(&str)> InputHandler for F {
    fn on_console_line(&mut self, line: &str) {
        self(line)
    }
}

/// The owner side has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

/// Schedules a line for later execution on the owner context
pub trait LineDelivery: Send + 'static {
    fn deliver(&self, line: String) -> Result<(), Disconnected>;
}

/// Worker-side handle of an [`OwnerQueue`]
#[derive(Clone)]
pub struct OwnerSender {
    tx: Sender<String>,
}

impl LineDelivery for OwnerSender {
    fn deliver(&self, line: String) -> Result<(), Disconnected> {
        self.tx.send(line).map_err(|_| Disconnected)
    }
}

/// Outcome of a timed pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// This many lines were handled
    Delivered(usize),
    /// Nothing arrived before the timeout
    Idle,
    /// Every sender is gone and the queue is empty
    Disconnected,
}

/// Owner-side queue of pending lines
pub struct OwnerQueue {
    rx: Receiver<String>,
    disconnected: bool,
}

impl OwnerQueue {
    pub fn new() -> (OwnerSender, OwnerQueue) {
        let (tx, rx) = mpsc::channel();
        (
            OwnerSender { tx },
            OwnerQueue {
                rx,
                disconnected: false,
            },
        )
    }

    /// Handle every line already queued without blocking
    pub fn pump<H: InputHandler + ?Sized>(&mut self, handler: &mut H) -> usize {
        let mut handled = 0;
        loop {
            match self.rx.try_recv() {
                Ok(line) => {
                    handler.on_console_line(&line);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        handled
    }

    /// Wait up to `timeout` for a line, then drain whatever else is queued
    pub fn pump_timeout<H: InputHandler + ?Sized>(&mut self, handler: &mut H, timeout: Duration) -> PumpStatus {
        match self.rx.recv_timeout(timeout) {
            Ok(line) => {
                handler.on_console_line(&line);
                PumpStatus::Delivered(1 + self.pump(handler))
            }
            Err(RecvTimeoutError::Timeout) => PumpStatus::Idle,
            Err(RecvTimeoutError::Disconnected) => {
                self.disconnected = true;
                PumpStatus::Disconnected
            }
        }
    }

    /// True once the worker side has dropped and the queue has been drained
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}
