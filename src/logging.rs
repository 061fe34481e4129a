//! Diagnostic log sink: three severity levels, append-only stores, and
//! read-back of previously written lines.
//!
//! The file store owns the line format. One entry per line, shaped
//! `YYYY-MM-DD HH:MM:SS [LEVEL] message`. Read-back tolerates foreign or
//! truncated lines by dropping anything that does not parse.

use crate::error::Result;
use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(format!(
                "unknown log level '{s}' (expected info, warning, or error)"
            )),
        }
    }
}

/// One diagnostic entry. Timestamps are naive local time, second precision,
/// because that is all the line format carries.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            level,
            message: message.into(),
        }
    }

    fn format_line(&self) -> String {
        format!(
            "{} [{}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.message
        )
    }
}

/// Parses one stored line back into an entry. Returns `None` for anything
/// that does not match the format: fewer than four whitespace-separated
/// parts, an unparseable timestamp, or an unknown level.
fn parse_line(line: &str) -> Option<LogEntry> {
    let mut parts = line.splitn(4, ' ');
    let date = parts.next()?;
    let time = parts.next()?;
    let level = parts.next()?;
    let message = parts.next()?;

    let timestamp =
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), TIMESTAMP_FORMAT).ok()?;
    let level = level
        .trim_matches(|c| c == '[' || c == ']')
        .parse::<LogLevel>()
        .ok()?;

    Some(LogEntry {
        timestamp,
        level,
        message: message.to_string(),
    })
}

/// Append-only entry store with read-back.
pub trait LogStore: Send + Sync {
    fn append(&self, entry: &LogEntry) -> Result<()>;

    /// All stored entries in append order. Malformed lines are dropped.
    fn entries(&self) -> Result<Vec<LogEntry>>;

    fn entries_with_level(&self, level: LogLevel) -> Result<Vec<LogEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.level == level)
            .collect())
    }
}

/// File-backed store. The file (and its parent directory) is created on the
/// first append; reading a store whose file does not exist yields no entries.
pub struct FileLogStore {
    path: PathBuf,
}

impl FileLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStore for FileLogStore {
    fn append(&self, entry: &LogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.format_line())?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content.lines().filter_map(parse_line).collect())
    }
}

/// In-memory store for tests and consumers that do not persist diagnostics.
#[derive(Default)]
pub struct MemoryLogStore {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryLogStore {
    fn append(&self, entry: &LogEntry) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(entry.clone());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<LogEntry>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.clone())
    }
}

/// Cheap-to-clone logging facade over a shared store.
///
/// Writing diagnostics is fire-and-forget: a store failure is reported on
/// stderr and otherwise swallowed, so a full disk cannot take down a timer
/// line.
#[derive(Clone)]
pub struct Logger {
    store: Arc<dyn LogStore>,
}

impl Logger {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileLogStore::new(path)))
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        if let Err(e) = self.store.append(&entry) {
            eprintln!("poolwatch: failed to write log entry: {e}");
        }
    }
}
