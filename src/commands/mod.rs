//! CLI command handlers for poolwatch.
//!
//! This module contains the implementation of all CLI subcommands.
//! Each command has its own module with a single handler function.
//!
//! # Commands
//!
//! - [`run`] - Monitor every configured pool on a repeating timer
//! - [`watch`] - Watch named pools with automatic restart
//! - [`pools`] - One monitoring pass, printed as a table or JSON
//! - [`logs`] - Read stored monitoring log entries back
//! - [`init`] - Create the config directory and starter config

mod init;
mod logs;
mod pools;
mod run;
mod watch;

pub use init::init_command;
pub use logs::logs_command;
pub use pools::pools_command;
pub use run::run_command;
pub use watch::watch_command;
