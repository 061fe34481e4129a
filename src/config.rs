use crate::error::{PoolwatchError, Result};
use crate::model::PipelineMode;
use crate::scheduler::TickPolicy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The base config directory name under ~/.config/
const CONFIG_DIR_NAME: &str = "poolwatch";

/// The filename for the configuration file.
const CONFIG_FILENAME: &str = "config.toml";

/// Default name of the monitoring log file inside the config directory.
const LOG_FILENAME: &str = "poolwatch.log";

// ============================================================================
// Pool Declarations
// ============================================================================

/// One `[[pool]]` block from the config file: a named group of worker
/// processes identified by a process-name pattern.
///
/// # Serialization
///
/// This struct supports TOML serialization via serde. Only `name` and
/// `pattern` are required; every other field falls back to the defaults
/// documented on it, so minimal declarations work correctly.
///
/// # Example
///
/// ```toml
/// [[pool]]
/// name = "DefaultAppPool"
/// pattern = "^w3wp"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolDecl {
    /// Unique pool name used in logs, snapshots, and CLI arguments.
    pub name: String,

    /// Regular expression matched against worker process names.
    pub pattern: String,

    /// Request pipeline mode reported on snapshots. Defaults to `integrated`.
    #[serde(default)]
    pub pipeline_mode: PipelineMode,

    /// Whether the pool is meant to start automatically. Defaults to `true`.
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Identity the pool's workers run under.
    /// Defaults to `"ApplicationPoolIdentity"`.
    #[serde(default = "default_identity_type")]
    pub identity_type: String,

    /// Idle timeout reported on snapshots, in seconds. Defaults to 1200.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Maximum worker process count reported on snapshots. Defaults to 1.
    #[serde(default = "default_max_processes")]
    pub max_processes: u64,

    /// Shell command used to start a stopped pool. When unset, recovery
    /// logs the attempt but has nothing to run.
    #[serde(default)]
    pub start_command: Option<String>,
}

impl PoolDecl {
    /// Create a declaration with the given name and pattern and the
    /// documented defaults for everything else.
    pub fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            pipeline_mode: PipelineMode::default(),
            auto_start: true,
            identity_type: default_identity_type(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_processes: default_max_processes(),
            start_command: None,
        }
    }
}

/// Helper function for serde default values (true).
fn default_true() -> bool {
    true
}

fn default_identity_type() -> String {
    "ApplicationPoolIdentity".to_string()
}

fn default_idle_timeout_secs() -> u64 {
    1200
}

fn default_max_processes() -> u64 {
    1
}

// ============================================================================
// Settings
// ============================================================================

/// Top-level configuration for a monitoring run.
///
/// # Default Behavior
///
/// A fresh install monitors nothing: the pass interval and CPU window get
/// their defaults, CSV export is on, and the pool list stays empty until
/// the user declares `[[pool]]` blocks.
///
/// # Serialization
///
/// Missing fields in a config file fall back to their defaults, allowing
/// partial configs to work correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds between monitoring passes over all configured pools.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Milliseconds between the two readings of a CPU sampling window.
    #[serde(default = "default_cpu_sample_ms")]
    pub cpu_sample_ms: u64,

    /// How a pass reacts when a single pool fails to resolve.
    ///
    /// `fail-fast` aborts the pass with one error line; `skip-failed` logs
    /// the failing pool and keeps going with the rest.
    #[serde(default)]
    pub on_pool_error: TickPolicy,

    /// Where monitoring log lines are written.
    /// Defaults to `~/.config/poolwatch/poolwatch.log` when unset.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Where daily CSV exports are written.
    /// Defaults to `historical/` under the working directory when unset.
    #[serde(default)]
    pub csv_dir: Option<PathBuf>,

    /// Whether snapshot batches are appended to the daily CSV file.
    #[serde(default = "default_true")]
    pub csv_enabled: bool,

    /// Declared application pools, one `[[pool]]` block each.
    #[serde(default, rename = "pool")]
    pub pools: Vec<PoolDecl>,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_cpu_sample_ms() -> u64 {
    500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cpu_sample_ms: default_cpu_sample_ms(),
            on_pool_error: TickPolicy::default(),
            log_file: None,
            csv_dir: None,
            csv_enabled: true,
            pools: Vec::new(),
        }
    }
}

impl Settings {
    /// Interval between monitoring passes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Width of the CPU sampling window.
    pub fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_ms)
    }

    /// The log file to write to, falling back to the config directory.
    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.log_file {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join(LOG_FILENAME)),
        }
    }

    /// The directory daily CSV exports land in.
    pub fn export_dir(&self) -> PathBuf {
        self.csv_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::export::DEFAULT_EXPORT_DIR))
    }

    /// Look up a declared pool by name.
    pub fn pool(&self, name: &str) -> Option<&PoolDecl> {
        self.pools.iter().find(|p| p.name == name)
    }
}

// ============================================================================
// Settings Validation
// ============================================================================

use std::error::Error;
use std::fmt;

/// Error type for settings validation failures.
///
/// Each variant carries enough context for a clear, actionable error
/// message naming the offending pool where one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// `interval_secs` is zero; the scheduler needs a positive period.
    ZeroInterval,
    /// `cpu_sample_ms` is zero; CPU percent needs a real window.
    ZeroCpuWindow,
    /// A `[[pool]]` block has an empty or whitespace-only name.
    EmptyPoolName,
    /// A `[[pool]]` block has an empty pattern.
    EmptyPoolPattern(String),
    /// Two `[[pool]]` blocks share a name.
    DuplicatePool(String),
    /// A pool's pattern is not a valid regular expression.
    InvalidPattern { name: String, reason: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::ZeroInterval => {
                write!(f, "interval_secs must be at least 1")
            }
            SettingsError::ZeroCpuWindow => {
                write!(f, "cpu_sample_ms must be at least 1")
            }
            SettingsError::EmptyPoolName => {
                write!(
                    f,
                    "A [[pool]] entry has an empty name. \
                    Give every pool a unique name"
                )
            }
            SettingsError::EmptyPoolPattern(name) => {
                write!(
                    f,
                    "Pool '{}' has an empty pattern. \
                    Set `pattern` to a process-name regex",
                    name
                )
            }
            SettingsError::DuplicatePool(name) => {
                write!(
                    f,
                    "Pool '{}' is declared more than once. \
                    Pool names must be unique",
                    name
                )
            }
            SettingsError::InvalidPattern { name, reason } => {
                write!(f, "Pool '{}' has an invalid pattern: {}", name, reason)
            }
        }
    }
}

impl Error for SettingsError {}

/// Validate settings for logical consistency.
///
/// This function checks that the settings are usable before the scheduler
/// starts. It should be called after loading a config file.
///
/// # Validation Rules
///
/// - `interval_secs` and `cpu_sample_ms` must be non-zero
/// - every pool needs a non-empty name and pattern
/// - pool names must be unique
/// - every pattern must compile as a regular expression
pub fn validate_settings(settings: &Settings) -> std::result::Result<(), SettingsError> {
    if settings.interval_secs == 0 {
        return Err(SettingsError::ZeroInterval);
    }
    if settings.cpu_sample_ms == 0 {
        return Err(SettingsError::ZeroCpuWindow);
    }

    let mut seen = HashSet::new();
    for pool in &settings.pools {
        if pool.name.trim().is_empty() {
            return Err(SettingsError::EmptyPoolName);
        }
        if pool.pattern.is_empty() {
            return Err(SettingsError::EmptyPoolPattern(pool.name.clone()));
        }
        if !seen.insert(pool.name.as_str()) {
            return Err(SettingsError::DuplicatePool(pool.name.clone()));
        }
        if let Err(e) = Regex::new(&pool.pattern) {
            return Err(SettingsError::InvalidPattern {
                name: pool.name.clone(),
                reason: e.to_string(),
            });
        }
    }

    Ok(())
}

// ============================================================================
// Config File Management
// ============================================================================

/// Default config file content with explanatory comments.
///
/// This is written when creating a new config file to help users understand
/// each option without needing to reference documentation.
const DEFAULT_CONFIG_WITH_COMMENTS: &str = r#"# Poolwatch Configuration
# Monitors named groups of worker processes (application pools) on this host.

# Seconds between monitoring passes over all configured pools.
interval_secs = 10

# Milliseconds between the two CPU readings of a sampling window.
cpu_sample_ms = 500

# What happens when a single pool fails to resolve during a pass:
# - "fail-fast": abort the pass and log one error
# - "skip-failed": log the failure and continue with the remaining pools
on_pool_error = "fail-fast"

# Where monitoring log lines are written.
# Defaults to ~/.config/poolwatch/poolwatch.log when unset.
#log_file = "/var/log/poolwatch.log"

# Daily CSV exports are written here when enabled.
# Defaults to ./historical when unset.
#csv_dir = "/var/lib/poolwatch/historical"
csv_enabled = true

# Each [[pool]] block declares one application pool to monitor.
# `pattern` is a regular expression matched against process names.
#[[pool]]
#name = "DefaultAppPool"
#pattern = "^w3wp"
#pipeline_mode = "integrated"    # integrated | classic
#auto_start = true
#identity_type = "ApplicationPoolIdentity"
#idle_timeout_secs = 1200
#max_processes = 1
#start_command = "systemctl start my-app.service"
"#;

/// Get the path to the config file.
///
/// Returns the path to `~/.config/poolwatch/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILENAME))
}

/// Load settings from `~/.config/poolwatch/config.toml`.
///
/// If the config file doesn't exist, it creates one with default values
/// and helpful comments explaining each option.
///
/// # Errors
///
/// Returns an error if:
/// - The home directory cannot be determined
/// - The config directory cannot be created
/// - The config file cannot be read (other than not existing)
/// - The config file contains invalid TOML
pub fn load_settings() -> Result<Settings> {
    let config_path = default_config_path()?;

    if !config_path.exists() {
        // Ensure the config directory exists
        ensure_config_dir()?;

        // Create the config file with default values and comments
        fs::write(&config_path, DEFAULT_CONFIG_WITH_COMMENTS)?;

        return Ok(Settings::default());
    }

    read_settings(&config_path)
}

/// Load settings from an explicit config file path.
///
/// Unlike [`load_settings`], a missing file is an error here: a path the
/// user named on the command line is expected to exist.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(PoolwatchError::ConfigNotFound(path.to_path_buf()));
    }
    read_settings(path)
}

/// Read and parse a settings file.
fn read_settings(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| {
        PoolwatchError::Config(format!("Failed to parse config file at {:?}: {}", path, e))
    })
}

/// Get the effective, validated settings for a run.
///
/// Resolves the config file by checking:
/// 1. An explicit `--config` path, when given (must exist)
/// 2. Otherwise `~/.config/poolwatch/config.toml`, created with defaults
///    on first use
///
/// **Important:** This function validates the settings before returning
/// them. Invalid settings result in an error.
pub fn effective_settings(override_path: Option<&Path>) -> Result<Settings> {
    let settings = match override_path {
        Some(path) => load_settings_from(path)?,
        None => load_settings()?,
    };

    // Validate the settings before returning
    validate_settings(&settings).map_err(|e| PoolwatchError::Config(e.to_string()))?;

    Ok(settings)
}

/// Write the commented default config file if none exists yet.
///
/// Returns the config path and whether a new file was written (true) or
/// one already existed (false). An existing file is never overwritten.
pub fn init_config() -> Result<(PathBuf, bool)> {
    let config_path = default_config_path()?;

    if config_path.exists() {
        return Ok((config_path, false));
    }

    ensure_config_dir()?;
    fs::write(&config_path, DEFAULT_CONFIG_WITH_COMMENTS)?;

    Ok((config_path, true))
}

// ============================================================================
// Directory Management
// ============================================================================

/// Get the poolwatch config directory path (~/.config/poolwatch/).
///
/// Returns the path to the config directory. Does not create the directory.
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PoolwatchError::Config("Could not determine home directory".to_string()))?;
    Ok(home.join(".config").join(CONFIG_DIR_NAME))
}

/// Ensure the poolwatch config directory exists (~/.config/poolwatch/).
///
/// Creates the directory if it doesn't exist. Returns whether the directory
/// was newly created (true) or already existed (false).
pub fn ensure_config_dir() -> Result<(PathBuf, bool)> {
    let dir = config_dir()?;
    let created = !dir.exists();
    fs::create_dir_all(&dir)?;
    Ok((dir, created))
}

/// Write the commented default config under a given base path.
///
/// This is a testable version of [`init_config`] that allows specifying a
/// custom base path standing in for the home directory.
#[cfg(test)]
fn init_config_at(base: &Path) -> Result<(PathBuf, bool)> {
    let dir = base.join(".config").join(CONFIG_DIR_NAME);
    fs::create_dir_all(&dir)?;

    let config_path = dir.join(CONFIG_FILENAME);
    if config_path.exists() {
        return Ok((config_path, false));
    }

    fs::write(&config_path, DEFAULT_CONFIG_WITH_COMMENTS)?;
    Ok((config_path, true))
}
