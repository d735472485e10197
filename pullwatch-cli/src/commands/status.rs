//! `pullwatch status` — daemon visibility with a config-only fallback.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use pullwatch_core::config;
use pullwatch_daemon::{paths::socket_path, request_status, DaemonError};

/// Arguments for `pullwatch status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Config file path (default: ~/.pullwatch/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Tabled)]
struct RepoRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "last check")]
    last_check: String,
    #[tabled(rename = "detail")]
    detail: String,
}

#[derive(Tabled)]
struct ConfiguredRow {
    #[tabled(rename = "repository")]
    repository: String,
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "members")]
    members: usize,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;

        match request_status(&home) {
            Ok(payload) => {
                if self.json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&payload)
                            .context("failed to render daemon status JSON")?
                    );
                } else {
                    print_daemon_status(&payload);
                }
                Ok(())
            }
            Err(DaemonError::DaemonNotRunning { .. }) => self.print_fallback(&home),
            Err(err) => Err(err).context("failed to query daemon status"),
        }
    }

    /// Daemon down: show what WOULD be managed, from config alone.
    fn print_fallback(self, home: &std::path::Path) -> Result<()> {
        let config_path = config::resolve_path(self.config.as_deref())
            .context("could not resolve config path")?;

        if self.json {
            let payload = serde_json::json!({
                "running": false,
                "socket": socket_path(home).display().to_string(),
                "config": config_path.display().to_string(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render status JSON")?
            );
            return Ok(());
        }

        println!("{}", "daemon is not running".yellow());
        let cfg = match config::load_at(&config_path) {
            Ok(cfg) => cfg,
            Err(err) => {
                println!("no usable config: {err}");
                return Ok(());
            }
        };

        let rows: Vec<ConfiguredRow> = cfg
            .targets()
            .iter()
            .map(|t| ConfiguredRow {
                repository: t.name.0.clone(),
                branch: t.branch.clone(),
                kind: t.kind.to_string(),
                members: t.process_group.len(),
            })
            .collect();
        if rows.is_empty() {
            println!("No repositories configured.");
            return Ok(());
        }

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("Start with 'pullwatch daemon start' or run 'pullwatch check --all'.");
        Ok(())
    }
}

fn print_daemon_status(payload: &Value) {
    let started = payload["started_at_unix"].as_u64().unwrap_or(0);
    let last_check = payload["last_check_at_unix"].as_u64().unwrap_or(0);
    println!(
        "pullwatch v{} | daemon {} | up {} | last sweep {}",
        env!("CARGO_PKG_VERSION"),
        "running".green().bold(),
        format_age(started),
        if last_check == 0 {
            "never".to_string()
        } else {
            format!("{} ago", format_age(last_check))
        },
    );

    let repos = payload["repositories"].as_array().cloned().unwrap_or_default();
    if repos.is_empty() {
        println!("No repositories checked yet.");
        return;
    }

    let rows: Vec<RepoRow> = repos
        .iter()
        .map(|repo| RepoRow {
            repository: repo["name"].as_str().unwrap_or("?").to_string(),
            outcome: outcome_label(repo["outcome"].as_str().unwrap_or("?")),
            last_check: match repo["checked_at_unix"].as_u64() {
                Some(ts) if ts > 0 => format!("{} ago", format_age(ts)),
                _ => "never".to_string(),
            },
            detail: repo["detail"].as_str().unwrap_or("").to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn outcome_label(outcome: &str) -> String {
    match outcome {
        "unchanged" => outcome.bright_black().to_string(),
        "updated" => outcome.green().bold().to_string(),
        "updated-build-failed" => outcome.yellow().bold().to_string(),
        "sync-failed" => outcome.red().bold().to_string(),
        other => other.to_string(),
    }
}

/// Compact age since a unix timestamp: `42s`, `7m`, `3h`, `2d`.
fn format_age(unix_secs: u64) -> String {
    let now = Utc::now().timestamp().max(0) as u64;
    let age = now.saturating_sub(unix_secs);
    if age < 60 {
        format!("{age}s")
    } else if age < 3600 {
        format!("{}m", age / 60)
    } else if age < 86_400 {
        format!("{}h", age / 3600)
    } else {
        format!("{}d", age / 86_400)
    }
}
