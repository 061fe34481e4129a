use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolwatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Management host error: {0}")]
    Host(String),

    #[error("Application pool '{0}' not found")]
    PoolNotFound(String),

    #[error("Process stat error: {0}")]
    Proc(String),

    #[error("CSV export error: {0}")]
    Export(String),

    #[error("Signal handler error: {0}")]
    Signal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PoolwatchError>;
