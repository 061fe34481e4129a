//! Logs command handler.
//!
//! Reads monitoring log entries back from the configured log file, with
//! optional level filtering and a tail limit.

use std::path::Path;

use crate::config;
use crate::console::{CYAN, GRAY, RED, RESET, YELLOW};
use crate::error::{PoolwatchError, Result};
use crate::logging::{FileLogStore, LogEntry, LogLevel, LogStore};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Keeps the last `tail` entries, or all of them when no limit is given.
fn tail_slice(mut entries: Vec<LogEntry>, tail: Option<usize>) -> Vec<LogEntry> {
    if let Some(n) = tail {
        let keep_from = entries.len().saturating_sub(n);
        entries.drain(..keep_from);
    }
    entries
}

fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => CYAN,
        LogLevel::Warning => YELLOW,
        LogLevel::Error => RED,
    }
}

/// Show stored monitoring log entries.
///
/// # Arguments
///
/// * `config` - Optional config file path (overrides the default location)
/// * `level` - Only show entries at this level (info, warning, or error)
/// * `tail` - Only show the last N matching entries
pub fn logs_command(config: Option<&Path>, level: Option<&str>, tail: Option<usize>) -> Result<()> {
    let level = match level {
        Some(s) => Some(s.parse::<LogLevel>().map_err(PoolwatchError::Config)?),
        None => None,
    };

    let settings = config::effective_settings(config)?;
    let path = settings.log_path()?;
    let store = FileLogStore::new(&path);

    let entries = match level {
        Some(level) => store.entries_with_level(level)?,
        None => store.entries()?,
    };
    let entries = tail_slice(entries, tail);

    if entries.is_empty() {
        println!("No log entries.");
        return Ok(());
    }

    for entry in &entries {
        let color = level_color(entry.level);
        println!(
            "{GRAY}{}{RESET} {color}[{}]{RESET} {}",
            entry.timestamp.format(TIMESTAMP_FORMAT),
            entry.level,
            entry.message
        );
    }

    let count = entries.len();
    println!();
    println!(
        "{GRAY}({count} {} from {}){RESET}",
        if count == 1 { "entry" } else { "entries" },
        path.display()
    );
    Ok(())
}
