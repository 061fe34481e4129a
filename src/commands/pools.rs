//! Pools command handler.
//!
//! One monitoring pass over every configured pool, printed as a table or
//! as JSON. Nothing is armed and nothing is exported.

use std::path::Path;

use crate::config;
use crate::console::{self, GRAY, RESET};
use crate::error::Result;
use crate::model::PoolStatus;

use super::run::build_scheduler;

/// Sample every configured pool once and print the result.
///
/// # Arguments
///
/// * `config` - Optional config file path (overrides the default location)
/// * `json` - Print the batch as pretty JSON instead of a table
pub fn pools_command(config: Option<&Path>, json: bool) -> Result<()> {
    let settings = config::effective_settings(config)?;
    if settings.pools.is_empty() {
        println!("No pools configured.");
        return Ok(());
    }

    let scheduler = build_scheduler(&settings)?;
    let batch = scheduler.sample_once()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
        return Ok(());
    }

    println!();
    console::print_snapshot_table(&batch, &[]);

    let started = batch
        .iter()
        .filter(|s| s.status == PoolStatus::Started)
        .count();
    println!();
    println!(
        "{GRAY}({started} of {} pool{} running){RESET}",
        batch.len(),
        if batch.len() == 1 { "" } else { "s" }
    );
    Ok(())
}
