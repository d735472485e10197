//! `pullwatch check` — one foreground sweep over configured repositories.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use pullwatch_core::config;
use pullwatch_core::types::CycleOutcome;
use pullwatch_exec::SystemRunner;
use pullwatch_sync::{pipeline, RepoReport, Scope};

/// Arguments for `pullwatch check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Name of the repository to check (omit when using `--all`).
    pub repo: Option<String>,

    /// Check every configured repository.
    #[arg(long, conflicts_with = "repo")]
    pub all: bool,

    /// Config file path (default: ~/.pullwatch/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config_path = config::resolve_path(self.config.as_deref())
            .context("could not resolve config path")?;
        let cfg = config::load_at(&config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?;

        let scope = if self.all {
            Scope::All
        } else {
            let name = self
                .repo
                .clone()
                .context("provide a repository name or use --all")?;
            Scope::Repo(name)
        };

        let reports =
            pipeline::run(&cfg, scope, &SystemRunner).context("sweep failed")?;
        if reports.is_empty() {
            println!("No repositories configured. Run `pullwatch config example` to start.");
            return Ok(());
        }

        for report in &reports {
            print_report(report);
        }
        Ok(())
    }
}

fn print_report(report: &RepoReport) {
    let indicator = match report.outcome {
        CycleOutcome::Unchanged => "·".bright_black().to_string(),
        CycleOutcome::Updated => "✓".green().bold().to_string(),
        CycleOutcome::UpdatedBuildFailed => "!".yellow().bold().to_string(),
        CycleOutcome::SyncFailed => "✗".red().bold().to_string(),
    };
    match &report.detail {
        Some(detail) => println!("{indicator} {} — {} ({detail})", report.repo, report.outcome),
        None => println!("{indicator} {} — {}", report.repo, report.outcome),
    }
}
