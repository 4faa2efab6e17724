//! Console bridge core.
//!
//! - **surface**: console capabilities (line input, text output, window controls)
//! - **tty**: stdio surface
//! - **win_console**: Windows console surface
//! - **scripted**: in-memory surface for tests and embedding
//! - **writer**: outbound text, capture, and log-line formatting
//! - **delivery**: owner-side queue of completed lines
//! - **worker**: blocking reader thread
//! - **session**: lifecycle tying the above together
//!
//! # Architecture
//!
//! ```text
//! ConsoleSession
//! ├── ConsoleWriter ──> TextSink
//! ├── ConsoleWindow (show/hide/placement/close lock)
//! └── ReaderWorker (own thread)
//!     └── LineSource ──line──> LineDelivery ──> OwnerQueue ──> InputHandler (owner thread)
//! ```

pub mod delivery;
pub mod scripted;
pub mod session;
pub mod surface;
pub mod tty;
#[cfg(windows)]
pub mod win_console;
pub mod worker;
pub mod writer;
