//! Shared sweep entrypoint used by CLI and daemon.

use pullwatch_core::config::Config;
use pullwatch_exec::CommandRunner;

use crate::error::SyncError;
use crate::orchestrator::{Orchestrator, RepoReport};

/// Scope for a sweep run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every configured repository, in config order.
    All,
    /// A single named repository.
    Repo(String),
}

/// Run one sweep for a scope.
///
/// This is the canonical entrypoint for both `pullwatch check` and the
/// daemon's poll processor. Repositories are handled serially; a failure in
/// one is folded into its report and never aborts the rest.
pub fn run(
    config: &Config,
    scope: Scope,
    runner: &dyn CommandRunner,
) -> Result<Vec<RepoReport>, SyncError> {
    let orchestrator = Orchestrator::new(runner, config);
    let targets = config.targets();

    match scope {
        Scope::All => Ok(targets
            .iter()
            .map(|target| orchestrator.run_repo(target))
            .collect()),
        Scope::Repo(name) => {
            let target = targets
                .iter()
                .find(|t| t.name.0 == name)
                .ok_or(SyncError::UnknownRepo { name })?;
            Ok(vec![orchestrator.run_repo(target)])
        }
    }
}
