//! `pullwatch daemon` — background daemon lifecycle and systemd management.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use pullwatch_core::config;
use pullwatch_daemon::paths::{socket_path, stderr_log_path, stdout_log_path};
use pullwatch_daemon::{
    install_systemd, request_check, request_status, request_stop, start_blocking,
    uninstall_systemd, DaemonError,
};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run daemon in foreground (poll loop + socket server).
    Start(DaemonConfigArgs),
    /// Request graceful daemon shutdown over Unix socket.
    Stop,
    /// Query daemon runtime status over Unix socket.
    Status,
    /// Ask the running daemon for an immediate sweep.
    Check(DaemonCheckArgs),
    /// Install and enable the systemd user service.
    Install(DaemonConfigArgs),
    /// Disable and remove the systemd user service.
    Uninstall,
    /// Print recent daemon log lines.
    Logs(DaemonLogsArgs),
}

#[derive(Args, Debug)]
pub struct DaemonConfigArgs {
    /// Config file path (default: ~/.pullwatch/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DaemonCheckArgs {
    /// Limit the sweep to one repository.
    pub repo: Option<String>,
}

#[derive(Args, Debug)]
pub struct DaemonLogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,

    /// Show only stderr log file.
    #[arg(long)]
    pub stderr_only: bool,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start(args) => {
            let config_path = config::resolve_path(args.config.as_deref())
                .context("could not resolve config path")?;
            start_blocking(&home, config_path).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(&home) {
            Ok(status) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {
                let payload = serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&payload)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Check(args) => match request_check(&home, args.repo) {
            Ok(summary) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary)
                        .context("failed to render sweep summary JSON")?
                );
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running; use 'pullwatch check' for a one-shot sweep");
            }
            Err(err) => return Err(err).context("failed to trigger sweep"),
        },
        DaemonCommand::Install(args) => {
            let config_path = config::resolve_path(args.config.as_deref())
                .context("could not resolve config path")?;
            // Fail early rather than installing a service that can't start.
            config::load_at(&config_path)
                .with_context(|| format!("config at {} is not usable", config_path.display()))?;
            let path =
                install_systemd(&home, &config_path).context("failed to install systemd service")?;
            println!("installed systemd service: {}", path.display());
        }
        DaemonCommand::Uninstall => {
            uninstall_systemd(&home).context("failed to uninstall systemd service")?;
            println!("uninstalled systemd service");
        }
        DaemonCommand::Logs(args) => {
            if args.stderr_only {
                print_tail(&stderr_log_path(&home), args.lines)
                    .context("failed to read daemon stderr log")?;
            } else {
                print_tail(&stdout_log_path(&home), args.lines)
                    .context("failed to read daemon stdout log")?;
                print_tail(&stderr_log_path(&home), args.lines)
                    .context("failed to read daemon stderr log")?;
            }
        }
    }

    Ok(())
}

fn print_tail(path: &std::path::Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
