//! Terminal output formatting for poolwatch.
//!
//! Provides consistent, colored output for all CLI operations plus the
//! live snapshot table shown while monitoring runs. [`ConsoleSink`] is the
//! subscriber flavor of the table, fed one batch per monitoring pass.

use crate::error::Result;
use crate::model::{PoolSnapshot, PoolStatus};
use crate::scheduler::SnapshotConsumer;

/// ANSI color codes for terminal output.
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const RED: &str = "\x1b[31m";
    pub const GRAY: &str = "\x1b[90m";
}

// Re-export colors at module level for convenience
pub use colors::*;

/// Print an error message.
pub fn print_error(msg: &str) {
    println!("{RED}{BOLD}Error:{RESET} {}", msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    println!("{YELLOW}Warning:{RESET} {}", msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{CYAN}Info:{RESET} {}", msg);
}

/// Print interruption message when the user presses Ctrl+C.
pub fn print_interrupted() {
    println!();
    println!("{YELLOW}Interrupted.{RESET} Stopping monitors...");
}

/// Color used for a pool status cell.
fn status_color(status: PoolStatus) -> &'static str {
    match status {
        PoolStatus::Started => GREEN,
        PoolStatus::Stopped => RED,
        PoolStatus::Starting | PoolStatus::Stopping => YELLOW,
        PoolStatus::Unknown => GRAY,
    }
}

/// Format a byte count for the memory column, scaling to KB/MB/GB.
pub fn format_memory(bytes: u64) -> String {
    let bytes = bytes as f64;
    let (value, unit) = if bytes >= 1024.0 * 1024.0 * 1024.0 {
        (bytes / (1024.0 * 1024.0 * 1024.0), "GB")
    } else if bytes >= 1024.0 * 1024.0 {
        (bytes / (1024.0 * 1024.0), "MB")
    } else if bytes >= 1024.0 {
        (bytes / 1024.0, "KB")
    } else {
        (bytes, "B")
    };
    format!("{:.1} {}", value, unit)
}

/// Print one batch of snapshots as an aligned table.
///
/// Pools listed in `highlights` get their name emphasized, which the
/// `run --watch` flow uses to mark the pools that also have a dedicated
/// monitor. Pools without a worker process show a dash in the PID column.
pub fn print_snapshot_table(snapshots: &[PoolSnapshot], highlights: &[String]) {
    if snapshots.is_empty() {
        println!("{GRAY}No pools to show.{RESET}");
        return;
    }

    let name_width = snapshots
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("Pool".len());

    println!(
        "{BOLD}{:<name_width$}  {:<8}  {:>8}  {:>7}  {:>10}  {:>8}{RESET}",
        "Pool", "Status", "PID", "CPU %", "Memory", "Requests"
    );

    for snapshot in snapshots {
        let pid = if snapshot.has_worker() {
            snapshot.process_id.to_string()
        } else {
            "-".to_string()
        };
        let color = status_color(snapshot.status);
        let name = if highlights.contains(&snapshot.name) {
            format!("{CYAN}{BOLD}{:<name_width$}{RESET}", snapshot.name)
        } else {
            format!("{:<name_width$}", snapshot.name)
        };

        println!(
            "{}  {color}{:<8}{RESET}  {:>8}  {:>7.1}  {:>10}  {:>8}",
            name,
            snapshot.status.as_str(),
            pid,
            snapshot.cpu_percent,
            format_memory(snapshot.memory_bytes),
            snapshot.request_count
        );
    }
}

/// Subscriber that renders every batch as a timestamped table.
pub struct ConsoleSink {
    highlights: Vec<String>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            highlights: Vec::new(),
        }
    }

    /// Emphasize the named pools in every table this sink prints.
    pub fn with_highlights(names: Vec<String>) -> Self {
        Self { highlights: names }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotConsumer for ConsoleSink {
    fn on_batch(&self, batch: &[PoolSnapshot]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        println!();
        println!(
            "{GRAY}{}{RESET}",
            batch[0].captured_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        print_snapshot_table(batch, &self.highlights);
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
