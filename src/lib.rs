//! conbridge - an interactive console bridged to a single-threaded owner
//!
//! A dedicated thread blocks on console input. Each completed line is
//! queued for the owning thread, which handles lines one at a time in the
//! order they were typed. Output goes through a writer that can be muted
//! for display while still capturing everything for a log file.

pub mod collab;
pub mod config;
pub mod core;
pub mod placement;

pub use crate::core::delivery::{InputHandler, LineDelivery, OwnerQueue, PumpStatus};
pub use crate::core::session::{ConsoleSession, SessionError, SessionOptions};
pub use crate::core::surface::{ConsoleWindow, SurfaceError, SurfaceProvider};
pub use crate::core::worker::WorkerState;
pub use crate::core::writer::{ConsoleWriter, LogLevel};
pub use crate::placement::{ConsolePositionMode, OwnerWindow};
