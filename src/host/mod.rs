//! Management host abstraction.
//!
//! The scheduler never talks to a concrete host API directly. It connects
//! through [`ManagementHost`] at the start of every tick, uses the returned
//! [`HostHandle`] to enumerate and describe pools, and drops the handle
//! before fanning the batch out.

mod local;

pub use local::LocalHost;

use crate::error::Result;
use crate::model::{PipelineMode, PoolStatus};
use std::time::Duration;

/// One worker process the host reports as attached to a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerProcess {
    pub pid: i64,
    pub active_requests: u32,
}

/// Pre-sampling description of one pool, as one `describe` call returns it.
#[derive(Debug, Clone)]
pub struct PoolInfo {
    pub name: String,
    pub status: PoolStatus,
    pub workers: Vec<WorkerProcess>,
    pub pipeline_mode: PipelineMode,
    pub auto_start: bool,
    pub identity_type: String,
    pub idle_timeout: Duration,
    pub max_processes: u64,
}

impl PoolInfo {
    /// Pid of the owning worker (the first one), 0 when none is attached.
    pub fn primary_pid(&self) -> i64 {
        self.workers.first().map(|w| w.pid).unwrap_or(0)
    }

    /// Active request count of the owning worker, 0 when none is attached.
    pub fn primary_requests(&self) -> u32 {
        self.workers.first().map(|w| w.active_requests).unwrap_or(0)
    }
}

/// Entry point to a management API.
pub trait ManagementHost: Send + Sync {
    /// Opens a session. The handle is held for at most one scheduler tick;
    /// concurrent timer lines each connect on their own.
    fn connect(&self) -> Result<Box<dyn HostHandle + '_>>;
}

/// One open session against the management API.
pub trait HostHandle {
    /// Names of all pools the host knows, in the host's order. Names are
    /// unique within one enumeration.
    fn pool_names(&mut self) -> Result<Vec<String>>;

    /// Describes one pool. `Ok(None)` means the host does not know the name.
    fn describe(&mut self, name: &str) -> Result<Option<PoolInfo>>;

    /// Issues a start command for the named pool. Fire-and-forget: success
    /// means the command was issued, not that the pool came up.
    fn start_pool(&mut self, name: &str) -> Result<()>;
}
