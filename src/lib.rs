pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod export;
pub mod host;
pub mod logging;
pub mod model;
pub mod sampler;
pub mod scheduler;
pub mod signal;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{PoolDecl, Settings};
pub use error::{PoolwatchError, Result};
pub use export::CsvExporter;
pub use host::{LocalHost, ManagementHost, PoolInfo};
pub use logging::{LogEntry, LogLevel, Logger};
pub use model::{PoolSnapshot, PoolStatus};
pub use sampler::ResourceSampler;
pub use scheduler::{MonitoringScheduler, SnapshotConsumer, TickPolicy};
pub use snapshot::SnapshotBuilder;
