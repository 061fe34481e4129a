//! CSV snapshot sink. Appends one row per snapshot to a daily file,
//! writing the header only when the file is created.

use crate::error::{PoolwatchError, Result};
use crate::model::PoolSnapshot;
use crate::scheduler::SnapshotConsumer;
use chrono::{Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory snapshots are exported to when the config does not say otherwise.
pub const DEFAULT_EXPORT_DIR: &str = "historical";

const CSV_HEADER: &str = "name,status,process_id,cpu_percent,memory_bytes,\
request_count,pipeline_mode,auto_start,identity_type,idle_timeout_secs,\
max_processes,captured_at,host_name,host_version";

/// Appends snapshot batches to `<dir>/pools-YYYYMMDD.csv`.
///
/// Values are rendered in their display form with literal commas replaced by
/// spaces. That keeps the delimiter unambiguous without quoting; it is a
/// lossy best-effort, not RFC 4180.
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    /// Creates the export directory if it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Appends one row per snapshot to today's file and returns its path.
    /// An empty batch is an error.
    pub fn export(&self, batch: &[PoolSnapshot]) -> Result<PathBuf> {
        if batch.is_empty() {
            return Err(PoolwatchError::Export(
                "cannot export an empty snapshot batch".to_string(),
            ));
        }

        let path = self.dir.join(daily_file_name(Local::now().date_naive()));
        let needs_header = !path.exists();

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if needs_header {
            writeln!(file, "{CSV_HEADER}")?;
        }
        for snapshot in batch {
            writeln!(file, "{}", format_row(snapshot))?;
        }

        Ok(path)
    }
}

impl SnapshotConsumer for CsvExporter {
    fn on_batch(&self, batch: &[PoolSnapshot]) -> Result<()> {
        // a tick over zero pools is not an export failure
        if batch.is_empty() {
            return Ok(());
        }
        self.export(batch)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "csv"
    }
}

fn daily_file_name(date: NaiveDate) -> String {
    format!("pools-{}.csv", date.format("%Y%m%d"))
}

fn sanitize(value: &str) -> String {
    value.replace(',', " ")
}

fn format_row(snapshot: &PoolSnapshot) -> String {
    let fields = [
        snapshot.name.clone(),
        snapshot.status.to_string(),
        snapshot.process_id.to_string(),
        snapshot.cpu_percent.to_string(),
        snapshot.memory_bytes.to_string(),
        snapshot.request_count.to_string(),
        snapshot.pipeline_mode.to_string(),
        snapshot.auto_start.to_string(),
        snapshot.identity_type.clone(),
        snapshot.idle_timeout.as_secs().to_string(),
        snapshot.max_processes.to_string(),
        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        snapshot.host_name.clone(),
        snapshot.host_version.clone(),
    ];
    fields
        .iter()
        .map(|f| sanitize(f))
        .collect::<Vec<_>>()
        .join(",")
}
