//! Snapshot construction: turns one host pool description into one
//! immutable [`PoolSnapshot`], sampling the owning worker process when
//! there is one.

use crate::host::PoolInfo;
use crate::model::PoolSnapshot;
use crate::sampler::ResourceSampler;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use sysinfo::System;

/// Wall clock clamped to never move backwards.
///
/// `captured_at` must be non-decreasing across every batch one scheduler
/// emits, even if the system clock is stepped back mid-run.
pub struct CaptureClock {
    last: Mutex<DateTime<Utc>>,
}

impl CaptureClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    #[cfg(test)]
    fn seeded(last: DateTime<Utc>) -> Self {
        Self {
            last: Mutex::new(last),
        }
    }

    /// Current time, clamped to the latest value this clock has returned.
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now().max(*last);
        *last = now;
        now
    }
}

impl Default for CaptureClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds snapshots for the scheduler. Host provenance is captured once at
/// construction; the capture clock is owned here so every call site of one
/// builder shares the monotonicity guarantee.
pub struct SnapshotBuilder {
    sampler: ResourceSampler,
    clock: CaptureClock,
    host_name: String,
    host_version: String,
}

impl SnapshotBuilder {
    pub fn new(sampler: ResourceSampler) -> Self {
        Self {
            sampler,
            clock: CaptureClock::new(),
            host_name: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            host_version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
        }
    }

    /// Overrides the captured host name and version.
    pub fn with_provenance(
        mut self,
        host_name: impl Into<String>,
        host_version: impl Into<String>,
    ) -> Self {
        self.host_name = host_name.into();
        self.host_version = host_version.into();
        self
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn host_version(&self) -> &str {
        &self.host_version
    }

    /// Builds one snapshot from one pool description. Never fails: sampling
    /// degrades to zero on its own, and everything else is plain data.
    ///
    /// CPU is only sampled when a worker is attached, because the sampler
    /// blocks for its measurement window. Memory sampling is always invoked
    /// with the resolved pid and handles the 0 sentinel itself.
    pub fn build(&self, pool: &PoolInfo) -> PoolSnapshot {
        let process_id = pool.primary_pid();
        let cpu_percent = if process_id > 0 {
            self.sampler.sample_cpu(process_id)
        } else {
            0.0
        };
        let memory_bytes = self.sampler.sample_memory(process_id);

        PoolSnapshot {
            name: pool.name.clone(),
            status: pool.status,
            process_id,
            cpu_percent,
            memory_bytes,
            request_count: pool.primary_requests(),
            pipeline_mode: pool.pipeline_mode,
            auto_start: pool.auto_start,
            identity_type: pool.identity_type.clone(),
            idle_timeout: pool.idle_timeout,
            max_processes: pool.max_processes,
            captured_at: self.clock.now(),
            host_name: self.host_name.clone(),
            host_version: self.host_version.clone(),
        }
    }
}
