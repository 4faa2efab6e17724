//! Console writer
//!
//! All outbound console text goes through [`ConsoleWriter`]. Blocking only
//! suppresses what reaches the surface; the capture buffer keeps recording.

use chrono::{DateTime, Utc};

use super::surface::TextSink;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Marker written after output to position the cursor for the next line
pub const PROMPT: &str = "> ";

/// Severity shown in a console log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Notice,
    Warning,
    Error,
    Info,
    Debug,
    Log,
}

const LEVEL_LABELS: [&str; 6] = ["Notice", "Warning", "Error", "Info", "Debug", "Log"];

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Notice,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Log,
    ];

    pub fn label(self) -> &'static str {
        LEVEL_LABELS[self as usize]
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `<2024-01-31T09:15:02.123Z> [Error] disk full`
pub fn format_log_entry(level: LogLevel, message: &str, at: DateTime<Utc>) -> String {
    format!(
        "<{}> [{}] {}",
        at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        level.label(),
        message
    )
}

/// `<message>` optionally followed by a space and `extra`
pub fn wrap_message(message: &str, extra: Option<&str>) -> String {
    match extra {
        Some(extra) => format!("<{}> {}", message, extra),
        None => format!("<{}>", message),
    }
}

/// Serializes text onto a console surface
pub struct ConsoleWriter {
    sink: Box<dyn TextSink>,
    blocked: bool,
    capture_enabled: bool,
    captured: String,
}

impl ConsoleWriter {
    pub fn new(sink: Box<dyn TextSink>) -> Self {
        Self {
            sink,
            blocked: false,
            capture_enabled: false,
            captured: String::new(),
        }
    }

    pub fn write(&mut self, text: &str) {
        if self.capture_enabled {
            self.captured.push_str(text);
        }
        if self.blocked {
            return;
        }
        // Best effort: the surface may already be torn down
        if let Err(e) = self.sink.write_raw(text) {
            tracing::debug!("Console write dropped: {}", e);
        }
    }

    pub fn write_line(&mut self, text: &str) {
        let mut line = String::with_capacity(text.len() + LINE_ENDING.len());
        line.push_str(text);
        line.push_str(LINE_ENDING);
        self.write(&line);
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn set_capture(&mut self, enabled: bool) {
        self.capture_enabled = enabled;
    }

    pub fn is_capturing(&self) -> bool {
        self.capture_enabled
    }

    pub fn captured_text(&self) -> &str {
        &self.captured
    }

    /// Take the capture buffer, leaving it empty
    pub fn take_captured(&mut self) -> String {
        std::mem::take(&mut self.captured)
    }

    /// Write a message line and/or a trailing prompt.
    ///
    /// Blank messages are skipped entirely; the prompt is still written when
    /// requested.
    pub fn prompted_write(&mut self, message: &str, with_prefix_colon: bool, with_trailing_prompt: bool) {
        if !message.trim().is_empty() {
            if with_prefix_colon {
                self.write_line(&format!(": {}", message));
            } else {
                self.write_line(message);
            }
        }
        if with_trailing_prompt {
            self.write(PROMPT);
        }
    }

    pub fn log_entry(&mut self, level: LogLevel, message: &str) {
        self.log_entry_at(level, message, Utc::now());
    }

    pub(crate) fn log_entry_at(&mut self, level: LogLevel, message: &str, at: DateTime<Utc>) {
        let line = format_log_entry(level, message, at);
        self.prompted_write(&line, false, true);
    }

    pub fn notice(&mut self, message: &str, extra: Option<&str>) {
        self.log_entry(LogLevel::Notice, &wrap_message(message, extra));
    }

    pub fn warning(&mut self, message: &str, extra: Option<&str>) {
        self.log_entry(LogLevel::Warning, &wrap_message(message, extra));
    }

    pub fn error(&mut self, message: &str, extra: Option<&str>) {
        self.log_entry(LogLevel::Error, &wrap_message(message, extra));
    }

    pub fn info(&mut self, message: &str, extra: Option<&str>) {
        self.log_entry(LogLevel::Info, &wrap_message(message, extra));
    }

    pub fn debug(&mut self, message: &str, extra: Option<&str>) {
        self.log_entry(LogLevel::Debug, &wrap_message(message, extra));
    }

    pub fn log(&mut self, message: &str, extra: Option<&str>) {
        self.log_entry(LogLevel::Log, &wrap_message(message, extra));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<String>>);

    impl TextSink for SharedSink {
        fn write_raw(&mut self, text: &str) -> io::Result<()> {
            self.0.lock().unwrap().push_str(text);
            Ok(())
        }
    }

    struct BrokenSink;

    impl TextSink for BrokenSink {
        fn write_raw(&mut self, _text: &str) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    fn writer() -> (ConsoleWriter, SharedSink) {
        let sink = SharedSink::default();
        (ConsoleWriter::new(Box::new(sink.clone())), sink)
    }

    fn is_log_timestamp(s: &str) -> bool {
        // YYYY-MM-DDThh:mm:ss.sssZ
        let b = s.as_bytes();
        b.len() == 24
            && b[4] == b'-'
            && b[7] == b'-'
            && b[10] == b'T'
            && b[13] == b':'
            && b[16] == b':'
            && b[19] == b'.'
            && b[23] == b'Z'
            && s.chars().enumerate().all(|(i, c)| {
                matches!(i, 4 | 7 | 10 | 13 | 16 | 19 | 23) || c.is_ascii_digit()
            })
    }

    #[test]
    fn test_level_labels() {
        let labels: Vec<_> = LogLevel::ALL.iter().map(|l| l.label()).collect();
        assert_eq!(labels, vec!["Notice", "Warning", "Error", "Info", "Debug", "Log"]);
        assert_eq!(LogLevel::Warning.to_string(), "Warning");
    }

    #[test]
    fn test_format_log_entry() {
        let at = Utc.with_ymd_and_hms(2024, 1, 31, 9, 15, 2).unwrap()
            + chrono::Duration::milliseconds(7);
        assert_eq!(
            format_log_entry(LogLevel::Error, "disk full", at),
            "<2024-01-31T09:15:02.007Z> [Error] disk full"
        );
    }

    #[test]
    fn test_log_entry_line_and_prompt() {
        let (mut w, sink) = writer();
        w.log_entry(LogLevel::Error, "disk full");

        let out = sink.0.lock().unwrap().clone();
        let expected_tail = format!("> [Error] disk full{}{}", LINE_ENDING, PROMPT);
        assert!(out.starts_with('<'));
        assert!(out.ends_with(&expected_tail), "unexpected output: {:?}", out);
        assert!(is_log_timestamp(&out[1..25]), "bad timestamp in {:?}", out);
    }

    #[test]
    fn test_notice_wraps_message_with_extra() {
        assert_eq!(wrap_message("saved", Some("file=x.txt")), "<saved> file=x.txt");
        assert_eq!(wrap_message("saved", None), "<saved>");

        let (mut w, sink) = writer();
        w.notice("saved", Some("file=x.txt"));
        let out = sink.0.lock().unwrap().clone();
        assert!(out.contains("Z> [Notice] <saved> file=x.txt"), "unexpected output: {:?}", out);
    }

    #[test]
    fn test_prompted_write() {
        let (mut w, sink) = writer();
        w.prompted_write("ready", true, false);
        w.prompted_write("   ", true, true);
        w.prompted_write("", false, false);
        assert_eq!(
            sink.0.lock().unwrap().as_str(),
            format!(": ready{}{}", LINE_ENDING, PROMPT)
        );
    }

    #[test]
    fn test_blocked_still_captures() {
        let (mut w, sink) = writer();
        w.set_capture(true);
        w.write("one ");
        w.set_blocked(true);
        assert!(w.is_blocked());
        w.write("two ");
        w.write_line("three");
        w.set_blocked(false);
        w.write("four");

        assert_eq!(sink.0.lock().unwrap().as_str(), "one four");
        assert_eq!(
            w.captured_text(),
            format!("one two three{}four", LINE_ENDING)
        );
    }

    #[test]
    fn test_capture_disabled_records_nothing() {
        let (mut w, _sink) = writer();
        w.write("hello");
        assert!(!w.is_capturing());
        assert_eq!(w.take_captured(), "");
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let mut w = ConsoleWriter::new(Box::new(BrokenSink));
        w.set_capture(true);
        w.write_line("still here");
        assert!(w.captured_text().starts_with("still here"));
    }
}
