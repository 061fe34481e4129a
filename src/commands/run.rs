//! Run command handler.
//!
//! Arms the global monitoring line (and a recovery line per watched pool),
//! then parks the main thread until Ctrl-C.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{self, Settings};
use crate::console::{self, ConsoleSink, GRAY, RESET};
use crate::error::{PoolwatchError, Result};
use crate::export::CsvExporter;
use crate::host::{LocalHost, ManagementHost};
use crate::logging::Logger;
use crate::sampler::ResourceSampler;
use crate::scheduler::MonitoringScheduler;
use crate::signal::SignalHandler;
use crate::snapshot::SnapshotBuilder;

/// Assembles the monitoring pipeline from validated settings.
///
/// Sinks are left to the caller: the one-shot commands print batches
/// directly instead of subscribing anything.
pub(crate) fn build_scheduler(settings: &Settings) -> Result<MonitoringScheduler> {
    let host: Arc<dyn ManagementHost> = Arc::new(LocalHost::new(&settings.pools)?);
    let logger = Logger::to_file(settings.log_path()?);
    let sampler = ResourceSampler::new(logger.clone()).with_window(settings.cpu_window());
    let builder = SnapshotBuilder::new(sampler);
    Ok(MonitoringScheduler::new(host, builder, logger).with_policy(settings.on_pool_error))
}

/// Rejects an empty pool table, naming the file the user has to edit.
pub(crate) fn require_pools(settings: &Settings, config: Option<&Path>) -> Result<()> {
    if settings.pools.is_empty() {
        let path = match config {
            Some(p) => p.to_path_buf(),
            None => config::default_config_path()?,
        };
        return Err(PoolwatchError::Config(format!(
            "no pools configured; add a [[pool]] entry to {}",
            path.display()
        )));
    }
    Ok(())
}

/// Every requested name must be declared in the config.
pub(crate) fn resolve_pool_names(settings: &Settings, names: &[String]) -> Result<()> {
    for name in names {
        if settings.pool(name).is_none() {
            return Err(PoolwatchError::PoolNotFound(name.clone()));
        }
    }
    Ok(())
}

/// Monitor every configured pool on a repeating timer.
///
/// # Arguments
///
/// * `config` - Optional config file path (overrides the default location)
/// * `interval` - Optional tick interval in seconds (overrides the config)
/// * `watch` - Pool names that also get a single-pool recovery line
///
/// # Returns
///
/// * `Ok(())` when stopped with Ctrl-C
/// * `Err(PoolwatchError)` if the config is unusable or the first sample fails
pub fn run_command(config: Option<&Path>, interval: Option<u64>, watch: &[String]) -> Result<()> {
    if interval == Some(0) {
        return Err(PoolwatchError::Config(
            "interval must be at least 1 second".to_string(),
        ));
    }

    let settings = config::effective_settings(config)?;
    require_pools(&settings, config)?;
    resolve_pool_names(&settings, watch)?;

    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.interval());

    let scheduler = build_scheduler(&settings)?;
    scheduler.subscribe(Arc::new(ConsoleSink::with_highlights(watch.to_vec())));
    if settings.csv_enabled {
        scheduler.subscribe(Arc::new(CsvExporter::new(settings.export_dir())?));
    }

    let signals = SignalHandler::new()?;

    let count = settings.pools.len();
    println!();
    console::print_info(&format!(
        "Monitoring {} pool{} every {}s (Ctrl-C to stop)",
        count,
        if count == 1 { "" } else { "s" },
        interval.as_secs()
    ));
    println!("{GRAY}Log file: {}{RESET}", settings.log_path()?.display());
    if settings.csv_enabled {
        println!(
            "{GRAY}CSV exports: {}{RESET}",
            settings.export_dir().display()
        );
    }

    // First table right away; the global line repeats it every interval.
    let batch = scheduler.sample_once()?;
    println!();
    console::print_snapshot_table(&batch, watch);

    scheduler.start_global(interval);
    for name in watch {
        scheduler.start_target(name, interval);
    }

    signals.wait_for_shutdown();
    println!();
    console::print_interrupted();
    scheduler.stop_all();
    Ok(())
}
