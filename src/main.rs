//! poolwatch CLI entry point.
//!
//! Parses command-line arguments and dispatches to the appropriate command handler.

use clap::{Parser, Subcommand};
use poolwatch::commands::{init_command, logs_command, pools_command, run_command, watch_command};
use poolwatch::console::print_error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "poolwatch")]
#[command(
    version,
    about = "Timer-driven monitor for named worker-process pools",
    after_help = "EXAMPLES:
    # Create ~/.config/poolwatch/config.toml
    poolwatch init

    # Monitor every configured pool (bare `poolwatch` does the same)
    poolwatch run
    poolwatch run --interval 5

    # Monitor everything and keep two pools restarted
    poolwatch run --watch web --watch api

    # Watch named pools only, with automatic restart
    poolwatch watch web api

    # One monitoring pass, as a table or JSON
    poolwatch pools
    poolwatch pools --json

    # Read the monitoring log back
    poolwatch logs --level error --tail 20"
)]
struct Cli {
    /// Path to a config file (defaults to ~/.config/poolwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor every configured pool on a repeating timer
    #[command(after_help = "EXAMPLES:
    poolwatch run                      # Use the configured interval
    poolwatch run --interval 5         # Tick every 5 seconds
    poolwatch run --watch web          # Also restart 'web' when it stops

WATCHED POOLS:
    Each --watch name gets its own timer line on top of the global one.
    When a watched pool is found stopped, its start command is issued and
    the attempt is logged.")]
    Run {
        /// Seconds between monitoring passes (overrides the config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Pool name that also gets a single-pool recovery line.
        /// May be given multiple times.
        #[arg(short, long = "watch", value_name = "POOL")]
        watch: Vec<String>,
    },

    /// Watch named pools and restart any that stop
    #[command(after_help = "EXAMPLES:
    poolwatch watch web                # Keep one pool running
    poolwatch watch web api --interval 5

BEHAVIOR:
    Unlike `run`, only the named pools are monitored. A pool found stopped
    has its start command issued; the snapshot taken that tick still shows
    the pre-restart status.")]
    Watch {
        /// Pool names to watch (each must be declared in the config)
        #[arg(required = true, value_name = "POOL")]
        pools: Vec<String>,

        /// Seconds between checks (overrides the config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Sample every configured pool once and print the result
    Pools {
        /// Print the batch as pretty JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show stored monitoring log entries
    Logs {
        /// Only show entries at this level (info, warning, or error)
        #[arg(short, long)]
        level: Option<String>,

        /// Only show the last N matching entries
        #[arg(short, long, value_name = "N")]
        tail: Option<usize>,
    },

    /// Create the config directory and a commented starter config
    Init,
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match &cli.command {
        Some(Commands::Run { interval, watch }) => run_command(config, *interval, watch),
        Some(Commands::Watch { pools, interval }) => watch_command(config, pools, *interval),
        Some(Commands::Pools { json }) => pools_command(config, *json),
        Some(Commands::Logs { level, tail }) => logs_command(config, level.as_deref(), *tail),
        Some(Commands::Init) => init_command(),

        // Bare `poolwatch` starts monitoring with config values.
        None => run_command(config, None, &[]),
    };

    if let Err(e) = result {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}
