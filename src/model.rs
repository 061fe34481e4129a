use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle state the management host reports for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Starting,
    Started,
    Stopping,
    Stopped,
    Unknown,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Starting => "Starting",
            PoolStatus::Started => "Started",
            PoolStatus::Stopping => "Stopping",
            PoolStatus::Stopped => "Stopped",
            PoolStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request pipeline mode a pool is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    Integrated,
    Classic,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::Integrated => "Integrated",
            PipelineMode::Classic => "Classic",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for PipelineMode {
    fn default() -> Self {
        PipelineMode::Integrated
    }
}

/// One immutable observation of one pool at one instant.
///
/// Produced by the snapshot builder once per pool per tick and handed to
/// subscribers as part of a batch. `process_id == 0` means no worker process
/// was attached at capture time, in which case `cpu_percent`, `memory_bytes`
/// and `request_count` are all zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub name: String,
    pub status: PoolStatus,
    pub process_id: i64,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub request_count: u32,
    pub pipeline_mode: PipelineMode,
    pub auto_start: bool,
    pub identity_type: String,
    pub idle_timeout: Duration,
    pub max_processes: u64,
    pub captured_at: DateTime<Utc>,
    pub host_name: String,
    pub host_version: String,
}

impl PoolSnapshot {
    /// True when a worker process was attached at capture time.
    pub fn has_worker(&self) -> bool {
        self.process_id != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_status_display() {
        assert_eq!(PoolStatus::Started.to_string(), "Started");
        assert_eq!(PoolStatus::Stopped.to_string(), "Stopped");
        assert_eq!(PoolStatus::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_pipeline_mode_defaults_to_integrated() {
        assert_eq!(PipelineMode::default(), PipelineMode::Integrated);
        assert_eq!(PipelineMode::default().to_string(), "Integrated");
    }

    #[test]
    fn test_status_serde_rename() {
        let json = serde_json::to_string(&PoolStatus::Stopping).unwrap();
        assert_eq!(json, "\"stopping\"");
        let back: PoolStatus = serde_json::from_str("\"started\"").unwrap();
        assert_eq!(back, PoolStatus::Started);
    }

    #[test]
    fn test_has_worker_sentinel() {
        let snap = sample_snapshot(0);
        assert!(!snap.has_worker());
        let snap = sample_snapshot(4242);
        assert!(snap.has_worker());
    }

    fn sample_snapshot(pid: i64) -> PoolSnapshot {
        PoolSnapshot {
            name: "api".to_string(),
            status: PoolStatus::Started,
            process_id: pid,
            cpu_percent: 0.0,
            memory_bytes: 0,
            request_count: 0,
            pipeline_mode: PipelineMode::Integrated,
            auto_start: true,
            identity_type: "ApplicationPoolIdentity".to_string(),
            idle_timeout: Duration::from_secs(20 * 60),
            max_processes: 1,
            captured_at: Utc::now(),
            host_name: "testhost".to_string(),
            host_version: "0.0".to_string(),
        }
    }
}
