//! Watch command handler.
//!
//! Single-pool monitoring with recovery: each named pool gets its own
//! timer line that restarts the pool whenever it is found stopped.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config;
use crate::console::{self, ConsoleSink};
use crate::error::{PoolwatchError, Result};
use crate::export::CsvExporter;
use crate::signal::SignalHandler;

use super::run::{build_scheduler, require_pools, resolve_pool_names};

/// Watch named pools, restarting any that stop.
///
/// # Arguments
///
/// * `config` - Optional config file path (overrides the default location)
/// * `pools` - Names to watch; each must be declared in the config
/// * `interval` - Optional tick interval in seconds (overrides the config)
pub fn watch_command(config: Option<&Path>, pools: &[String], interval: Option<u64>) -> Result<()> {
    if pools.is_empty() {
        return Err(PoolwatchError::Config(
            "name at least one pool to watch".to_string(),
        ));
    }
    if interval == Some(0) {
        return Err(PoolwatchError::Config(
            "interval must be at least 1 second".to_string(),
        ));
    }

    let settings = config::effective_settings(config)?;
    require_pools(&settings, config)?;
    resolve_pool_names(&settings, pools)?;

    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.interval());

    let scheduler = build_scheduler(&settings)?;
    scheduler.subscribe(Arc::new(ConsoleSink::with_highlights(pools.to_vec())));
    if settings.csv_enabled {
        scheduler.subscribe(Arc::new(CsvExporter::new(settings.export_dir())?));
    }

    let signals = SignalHandler::new()?;

    let count = pools.len();
    println!();
    console::print_info(&format!(
        "Watching {} pool{} every {}s with automatic restart (Ctrl-C to stop)",
        count,
        if count == 1 { "" } else { "s" },
        interval.as_secs()
    ));

    // Current state of the watched pools before the first tick lands.
    let mut batch = scheduler.sample_once()?;
    batch.retain(|s| pools.contains(&s.name));
    println!();
    console::print_snapshot_table(&batch, pools);

    for name in pools {
        scheduler.start_target(name, interval);
    }

    signals.wait_for_shutdown();
    println!();
    console::print_interrupted();
    scheduler.stop_all();
    Ok(())
}
