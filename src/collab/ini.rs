//! Typed INI file access
//!
//! Reads fall back to the caller's default when the file, section, or key
//! is missing or the value does not parse. Writes rewrite the whole file,
//! keeping unrelated sections and keys in place.
//!
//! Numbers and dates are written in locale-independent form: floats through
//! Rust's `Display`, date-times as RFC 3339.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IniError {
    #[error("No INI file path configured")]
    NoBackingFile,

    #[error("INI {0} name must not be blank")]
    BlankName(&'static str),

    #[error("Failed to access INI file: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, IniError>;

#[derive(Debug, Clone, Default)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

/// Parsed INI contents. Names compare case-insensitively.
#[derive(Debug, Clone, Default)]
struct Document {
    sections: Vec<Section>,
}

impl Document {
    fn parse(text: &str) -> Self {
        let mut doc = Document::default();
        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                doc.sections.push(Section {
                    name: name.trim().to_string(),
                    entries: Vec::new(),
                });
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                // Keys before any section header are dropped
                if let Some(section) = doc.sections.last_mut() {
                    section.entries.push((key.trim().to_string(), value.trim().to_string()));
                }
            }
        }
        doc
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(section))?
            .entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, section: &str, key: &str, value: String) {
        let idx = match self
            .sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(section))
        {
            Some(idx) => idx,
            None => {
                self.sections.push(Section {
                    name: section.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        let entries = &mut self.sections[idx].entries;
        match entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(entry) => entry.1 = value,
            None => entries.push((key.to_string(), value)),
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (k, v) in &section.entries {
                out.push_str(k);
                out.push('=');
                out.push_str(v);
                out.push('\n');
            }
        }
        out
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn check_names(section: &str, key: &str) -> Result<()> {
    if section.trim().is_empty() {
        return Err(IniError::BlankName("section"));
    }
    if key.trim().is_empty() {
        return Err(IniError::BlankName("key"));
    }
    Ok(())
}

/// INI file with typed accessors
#[derive(Debug, Clone, Default)]
pub struct IniStore {
    path: Option<PathBuf>,
}

impl IniStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn load(&self) -> Option<Document> {
        let path = self.path.as_ref()?;
        let text = fs::read_to_string(path).ok()?;
        Some(Document::parse(&text))
    }

    fn raw(&self, section: &str, key: &str) -> Option<String> {
        self.load()?.get(section, key).map(str::to_string)
    }

    fn write_raw(&self, section: &str, key: &str, value: String) -> Result<()> {
        let path = self.path.as_ref().ok_or(IniError::NoBackingFile)?;
        check_names(section, key)?;
        let mut doc = match fs::read_to_string(path) {
            Ok(text) => Document::parse(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(e.into()),
        };
        doc.set(section.trim(), key.trim(), value);
        fs::write(path, doc.render())?;
        Ok(())
    }

    pub fn read_string(&self, section: &str, key: &str, default: &str) -> String {
        self.raw(section, key).unwrap_or_else(|| default.to_string())
    }

    pub fn read_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.raw(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn read_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.raw(section, key)
            .and_then(|v| parse_bool(&v))
            .unwrap_or(default)
    }

    pub fn read_float(&self, section: &str, key: &str, default: f64) -> f64 {
        self.raw(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn read_datetime(&self, section: &str, key: &str, default: DateTime<Utc>) -> DateTime<Utc> {
        self.raw(section, key)
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(default)
    }

    pub fn write_string(&self, section: &str, key: &str, value: &str) -> Result<()> {
        self.write_raw(section, key, value.to_string())
    }

    pub fn write_int(&self, section: &str, key: &str, value: i64) -> Result<()> {
        self.write_raw(section, key, value.to_string())
    }

    pub fn write_bool(&self, section: &str, key: &str, value: bool) -> Result<()> {
        self.write_raw(section, key, if value { "1" } else { "0" }.to_string())
    }

    pub fn write_float(&self, section: &str, key: &str, value: f64) -> Result<()> {
        self.write_raw(section, key, value.to_string())
    }

    pub fn write_datetime(&self, section: &str, key: &str, value: DateTime<Utc>) -> Result<()> {
        self.write_raw(section, key, value.to_rfc3339())
    }
}
