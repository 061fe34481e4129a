//! Test fixtures shared across modules: a scripted management host plus
//! collecting and failing snapshot consumers.

use crate::error::{PoolwatchError, Result};
use crate::host::{HostHandle, ManagementHost, PoolInfo, WorkerProcess};
use crate::model::{PipelineMode, PoolSnapshot, PoolStatus};
use crate::scheduler::SnapshotConsumer;
use std::sync::Mutex;
use std::time::Duration;

/// A pool that reports `Started`. `pid > 0` attaches one worker process;
/// 0 leaves the pool running without a resolvable worker.
pub fn running_pool(name: &str, pid: i64) -> PoolInfo {
    let workers = if pid > 0 {
        vec![WorkerProcess {
            pid,
            active_requests: 0,
        }]
    } else {
        Vec::new()
    };
    PoolInfo {
        name: name.to_string(),
        status: PoolStatus::Started,
        workers,
        pipeline_mode: PipelineMode::Integrated,
        auto_start: true,
        identity_type: "ApplicationPoolIdentity".to_string(),
        idle_timeout: Duration::from_secs(1200),
        max_processes: 1,
    }
}

/// A pool that reports `Stopped` with no workers.
pub fn stopped_pool(name: &str) -> PoolInfo {
    PoolInfo {
        status: PoolStatus::Stopped,
        ..running_pool(name, 0)
    }
}

struct MockPool {
    info: PoolInfo,
    describe_error: Option<String>,
}

/// Scripted management host. Pools are served in insertion order;
/// individual pools, the connection, or the start command can be told to
/// fail. Start commands are recorded whether they succeed or not.
pub struct MockHost {
    pools: Mutex<Vec<MockPool>>,
    connect_error: Mutex<Option<String>>,
    start_error: Mutex<Option<String>>,
    started: Mutex<Vec<String>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            pools: Mutex::new(Vec::new()),
            connect_error: Mutex::new(None),
            start_error: Mutex::new(None),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn add_pool(&self, info: PoolInfo) {
        self.pools.lock().unwrap().push(MockPool {
            info,
            describe_error: None,
        });
    }

    /// Adds a pool whose name enumerates normally but whose `describe`
    /// fails with the given message.
    pub fn add_failing_pool(&self, name: &str, message: &str) {
        self.pools.lock().unwrap().push(MockPool {
            info: stopped_pool(name),
            describe_error: Some(message.to_string()),
        });
    }

    pub fn set_connect_error(&self, message: &str) {
        *self.connect_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_start_error(&self, message: &str) {
        *self.start_error.lock().unwrap() = Some(message.to_string());
    }

    /// Names passed to `start_pool`, in call order.
    pub fn started_pools(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

impl ManagementHost for MockHost {
    fn connect(&self) -> Result<Box<dyn HostHandle + '_>> {
        if let Some(message) = self.connect_error.lock().unwrap().clone() {
            return Err(PoolwatchError::Host(message));
        }
        Ok(Box::new(MockHandle { host: self }))
    }
}

struct MockHandle<'a> {
    host: &'a MockHost,
}

impl HostHandle for MockHandle<'_> {
    fn pool_names(&mut self) -> Result<Vec<String>> {
        let pools = self.host.pools.lock().unwrap();
        Ok(pools.iter().map(|p| p.info.name.clone()).collect())
    }

    fn describe(&mut self, name: &str) -> Result<Option<PoolInfo>> {
        let pools = self.host.pools.lock().unwrap();
        match pools.iter().find(|p| p.info.name == name) {
            Some(pool) => match &pool.describe_error {
                Some(message) => Err(PoolwatchError::Host(message.clone())),
                None => Ok(Some(pool.info.clone())),
            },
            None => Ok(None),
        }
    }

    fn start_pool(&mut self, name: &str) -> Result<()> {
        self.host.started.lock().unwrap().push(name.to_string());
        if let Some(message) = self.host.start_error.lock().unwrap().clone() {
            return Err(PoolwatchError::Host(message));
        }
        Ok(())
    }
}

/// Consumer that records every batch it receives.
pub struct CollectingSink {
    batches: Mutex<Vec<Vec<PoolSnapshot>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn batches(&self) -> Vec<Vec<PoolSnapshot>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl SnapshotConsumer for CollectingSink {
    fn on_batch(&self, batch: &[PoolSnapshot]) -> Result<()> {
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "collector"
    }
}

/// Consumer that always fails.
pub struct FailingSink;

impl SnapshotConsumer for FailingSink {
    fn on_batch(&self, _batch: &[PoolSnapshot]) -> Result<()> {
        Err(PoolwatchError::Export("sink exploded".to_string()))
    }

    fn name(&self) -> &str {
        "exploding"
    }
}
