//! pullwatch — git auto-pull and build/restart daemon CLI.
//!
//! # Usage
//!
//! ```text
//! pullwatch check [<repo>] [--all] [--config <path>]
//! pullwatch status [--json] [--config <path>]
//! pullwatch config validate|example|path [--config <path>]
//! pullwatch daemon start|stop|status|install|uninstall|logs
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs, config::ConfigCommand, daemon::DaemonCommand, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pullwatch",
    version,
    about = "Keep local git repositories synced with their remotes, rebuilding and restarting dependents",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one sweep over configured repositories in the foreground.
    Check(CheckArgs),

    /// Show daemon status, or the configured repositories when it is down.
    Status(StatusArgs),

    /// Validate or scaffold the configuration file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Manage the pullwatch background daemon and systemd integration.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Check(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
