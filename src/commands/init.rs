//! Init command handler.
//!
//! Creates the poolwatch config directory and a commented starter config.

use crate::config;
use crate::console::{BOLD, CYAN, GRAY, GREEN, RESET};
use crate::error::Result;

/// Initialize poolwatch configuration.
///
/// Creates the following structure:
/// - `~/.config/poolwatch/` - Config directory
/// - `~/.config/poolwatch/config.toml` - Commented starter configuration
///
/// An existing config file is never overwritten.
///
/// # Returns
///
/// * `Ok(())` on success
/// * `Err(PoolwatchError)` if directory or file creation fails
pub fn init_command() -> Result<()> {
    println!("Initializing poolwatch...");
    println!();

    let (config_dir, dir_created) = config::ensure_config_dir()?;
    if dir_created {
        println!("  {GREEN}Created{RESET} {}", config_dir.display());
    } else {
        println!("  {GRAY}Exists{RESET}  {}", config_dir.display());
    }

    let (config_path, file_created) = config::init_config()?;
    if file_created {
        println!("  {GREEN}Created{RESET} {}", config_path.display());
    } else {
        println!("  {GRAY}Exists{RESET}  {}", config_path.display());
    }

    println!();
    println!("{GREEN}Initialization complete!{RESET}");
    println!();
    println!("{BOLD}Next steps:{RESET}");
    println!(
        "  1. Add a {CYAN}[[pool]]{RESET} entry to {}",
        config_path.display()
    );
    println!("  2. Run {CYAN}poolwatch run{RESET} to start monitoring");

    Ok(())
}
