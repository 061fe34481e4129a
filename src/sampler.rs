//! Per-process resource sampling via /proc.
//!
//! CPU utilization is derived from two readings of the process's accumulated
//! CPU time separated by a short measurement window:
//! `percent = cpu_delta_ms / (logical_cores * wall_delta_ms) * 100`.
//! Memory is the resident set size at the moment of the call.

use crate::error::{PoolwatchError, Result};
use crate::logging::Logger;
use std::fs;
use std::thread;
use std::time::{Duration, Instant};

/// Time between the two CPU-time readings unless overridden.
pub const DEFAULT_CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(500);

// Field positions in /proc/<pid>/stat, counted from the first field after
// the comm. The comm itself can contain spaces, so fields are split after
// the last ')'.
const STAT_UTIME: usize = 11;
const STAT_STIME: usize = 12;
const STAT_RSS: usize = 21;

/// Point-in-time CPU and memory readings for single processes.
///
/// Sampling never fails from the caller's point of view: a process that
/// cannot be resolved (typically exited between enumeration and sampling)
/// yields 0 and one Error entry in the log sink. Pid 0 is the documented
/// no-worker sentinel and yields 0 silently.
pub struct ResourceSampler {
    window: Duration,
    cores: u64,
    logger: Logger,
}

impl ResourceSampler {
    pub fn new(logger: Logger) -> Self {
        Self {
            window: DEFAULT_CPU_SAMPLE_WINDOW,
            cores: logical_cores(),
            logger,
        }
    }

    /// Overrides the CPU measurement window. Every `sample_cpu` call blocks
    /// for this long.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Resident set size in bytes. 0 for the pid-0 sentinel or a process
    /// that cannot be resolved.
    pub fn sample_memory(&self, pid: i64) -> u64 {
        if pid == 0 {
            return 0;
        }
        match read_rss_bytes(pid) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.logger
                    .error(format!("Error retrieving memory usage for process {pid}: {e}"));
                0
            }
        }
    }

    /// CPU utilization in percent of total machine capacity over one
    /// measurement window. 0 for the pid-0 sentinel or a process that
    /// cannot be resolved at either reading.
    pub fn sample_cpu(&self, pid: i64) -> f64 {
        if pid == 0 {
            return 0.0;
        }
        match self.measure_cpu(pid) {
            Ok(percent) => percent,
            Err(e) => {
                self.logger
                    .error(format!("Error retrieving CPU usage for process {pid}: {e}"));
                0.0
            }
        }
    }

    fn measure_cpu(&self, pid: i64) -> Result<f64> {
        let started = Instant::now();
        let first = read_cpu_time_ms(pid)?;
        thread::sleep(self.window);
        let second = read_cpu_time_ms(pid)?;
        let wall_ms = started.elapsed().as_secs_f64() * 1000.0;
        let cpu_delta_ms = second.saturating_sub(first) as f64;
        Ok(cpu_percent(cpu_delta_ms, self.cores, wall_ms))
    }
}

fn cpu_percent(cpu_delta_ms: f64, cores: u64, wall_delta_ms: f64) -> f64 {
    if wall_delta_ms <= 0.0 {
        return 0.0;
    }
    cpu_delta_ms / (cores.max(1) as f64 * wall_delta_ms) * 100.0
}

fn logical_cores() -> u64 {
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n > 0 {
        n as u64
    } else {
        1
    }
}

/// Accumulated CPU time (user + system) of a process in milliseconds.
fn read_cpu_time_ms(pid: i64) -> Result<u64> {
    let fields = read_stat_tail(pid)?;
    let utime = parse_stat_field(&fields, STAT_UTIME, pid)?;
    let stime = parse_stat_field(&fields, STAT_STIME, pid)?;

    let clk_tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if clk_tck <= 0 {
        return Err(PoolwatchError::Proc(
            "sysconf(_SC_CLK_TCK) failed".to_string(),
        ));
    }
    Ok((utime + stime) * 1000 / clk_tck as u64)
}

/// Resident set size of a process in bytes.
fn read_rss_bytes(pid: i64) -> Result<u64> {
    let fields = read_stat_tail(pid)?;
    let rss_pages = parse_stat_field(&fields, STAT_RSS, pid)?;

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return Err(PoolwatchError::Proc(
            "sysconf(_SC_PAGESIZE) failed".to_string(),
        ));
    }
    Ok(rss_pages * page_size as u64)
}

fn read_stat_tail(pid: i64) -> Result<Vec<String>> {
    let path = format!("/proc/{pid}/stat");
    let content = fs::read_to_string(&path)
        .map_err(|e| PoolwatchError::Proc(format!("failed to read {path}: {e}")))?;
    let tail = content
        .rfind(')')
        .map(|i| &content[i + 1..])
        .ok_or_else(|| PoolwatchError::Proc(format!("malformed stat for process {pid}")))?;
    Ok(tail.split_whitespace().map(str::to_string).collect())
}

fn parse_stat_field(fields: &[String], index: usize, pid: i64) -> Result<u64> {
    fields
        .get(index)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| {
            PoolwatchError::Proc(format!("invalid stat field {index} for process {pid}"))
        })
}
