//! `pullwatch config` — configuration inspection and scaffolding.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use pullwatch_core::config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Load the config and report whether it is usable.
    Validate(ConfigPathArg),
    /// Print a starter config to stdout.
    Example,
    /// Print the resolved config file path.
    Path(ConfigPathArg),
}

#[derive(Args, Debug)]
pub struct ConfigPathArg {
    /// Config file path (default: ~/.pullwatch/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Validate(args) => {
            let path = config::resolve_path(args.config.as_deref())
                .context("could not resolve config path")?;
            let cfg = config::load_at(&path)
                .with_context(|| format!("config at {} is not usable", path.display()))?;
            let buildable = cfg
                .targets()
                .iter()
                .filter(|t| t.manages_processes())
                .count();
            println!(
                "✓ {} — {} repositories ({} with managed process groups), checking every {}s",
                path.display(),
                cfg.repositories.len(),
                buildable,
                cfg.check_interval,
            );
        }
        ConfigCommand::Example => {
            print!("{}", config::example());
        }
        ConfigCommand::Path(args) => {
            let path = config::resolve_path(args.config.as_deref())
                .context("could not resolve config path")?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
