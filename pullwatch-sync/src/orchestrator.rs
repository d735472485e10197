//! Per-repository update orchestration.
//!
//! ## Phase order for a changed `buildable` repository
//!
//! 1. Detect — fetch + compare heads (no local state touched).
//! 2. Stop the process group. Members must be down BEFORE the pull so a
//!    running process never reads a half-updated tree.
//! 3. Apply — checkout + pull.
//! 4. Build — configured command through `sh -c`, output streamed.
//! 5. Start the process group. Under the default `always` policy this
//!    happens even after a failed build: a failed build must not leave
//!    members stopped until someone notices.
//!
//! Any failure after members were stopped triggers the compensating start
//! before the cycle reports failure; recovery failures are logged, never
//! raised — the next poll cycle is the retry mechanism.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use pullwatch_core::config::Config;
use pullwatch_core::types::{CycleOutcome, ProcessAction, RepoName, RepoTarget, RestartPolicy};
use pullwatch_exec::{CommandRunner, CommandSpec, ProcessGroup};

use crate::error::SyncError;
use crate::git::{short_id, GitRepo};

/// Outcome of one repository's orchestration pass.
#[derive(Debug, Clone, Serialize)]
pub struct RepoReport {
    pub repo: RepoName,
    pub outcome: CycleOutcome,
    /// Failure reason, or `old -> new` heads on an update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u128,
}

/// Drives the per-repository state machine. Holds only configuration;
/// all state is git's and the process manager's.
pub struct Orchestrator<'r> {
    runner: &'r dyn CommandRunner,
    process_manager: String,
    restart_policy: RestartPolicy,
    timeout: Option<Duration>,
}

impl<'r> Orchestrator<'r> {
    pub fn new(runner: &'r dyn CommandRunner, config: &Config) -> Self {
        Self {
            runner,
            process_manager: config.process_manager.clone(),
            restart_policy: config.restart_policy,
            timeout: config.command_timeout.map(Duration::from_secs),
        }
    }

    /// Run one full orchestration pass for `target`. Never panics and never
    /// returns an error: every failure is folded into the report so one
    /// repository can never abort another's handling.
    pub fn run_repo(&self, target: &RepoTarget) -> RepoReport {
        let started = Instant::now();
        tracing::info!(repo = %target.name, branch = %target.branch, "checking repository");

        let (outcome, detail) = self.run_phases(target);

        match outcome {
            CycleOutcome::Unchanged => {
                tracing::info!(repo = %target.name, "up to date");
            }
            CycleOutcome::Updated => {
                tracing::info!(repo = %target.name, detail = detail.as_deref().unwrap_or(""), "updated");
            }
            CycleOutcome::UpdatedBuildFailed => {
                tracing::error!(repo = %target.name, detail = detail.as_deref().unwrap_or(""), "updated, but build failed");
            }
            CycleOutcome::SyncFailed => {
                tracing::error!(repo = %target.name, detail = detail.as_deref().unwrap_or(""), "sync failed");
            }
        }

        RepoReport {
            repo: target.name.clone(),
            outcome,
            detail,
            finished_at: Utc::now(),
            duration_ms: started.elapsed().as_millis(),
        }
    }

    fn run_phases(&self, target: &RepoTarget) -> (CycleOutcome, Option<String>) {
        let git = GitRepo::new(target, self.timeout);
        let group = ProcessGroup::new(self.process_manager.as_str()).with_timeout(self.timeout);

        // Detecting.
        let detected = match git.detect(self.runner) {
            Ok(detected) => detected,
            Err(err) => return (CycleOutcome::SyncFailed, Some(err.to_string())),
        };
        if !detected.changed() {
            return (CycleOutcome::Unchanged, None);
        }

        let heads = format!(
            "{} -> {}",
            short_id(&detected.local),
            short_id(&detected.remote)
        );
        tracing::info!(repo = %target.name, heads = %heads, "changes detected");

        // Stopping — before the pull, so the old processes keep serving the
        // old tree right up until they are down.
        let manages = target.manages_processes();
        if manages {
            if let Err(err) = group.apply(self.runner, &target.process_group, ProcessAction::Stop)
            {
                // An already-stopped member is indistinguishable from a real
                // failure here; neither blocks the update.
                tracing::warn!(repo = %target.name, error = %err, "stop phase incomplete");
            }
        }

        // Applying.
        if let Err(err) = git.apply(self.runner) {
            if manages {
                self.recover(target, &group);
            }
            return (CycleOutcome::SyncFailed, Some(err.to_string()));
        }

        // BuildPhase.
        let build_failure = self.build(target);
        let build_ok = build_failure.is_none();

        // RestartPhase.
        if manages {
            if build_ok || self.restart_policy == RestartPolicy::Always {
                if let Err(err) =
                    group.apply(self.runner, &target.process_group, ProcessAction::Start)
                {
                    tracing::error!(repo = %target.name, error = %err, "start phase incomplete");
                }
            } else {
                tracing::warn!(
                    repo = %target.name,
                    "build failed; leaving process group stopped (restart_policy: on-success)"
                );
            }
        }

        if build_ok {
            (CycleOutcome::Updated, Some(heads))
        } else {
            (CycleOutcome::UpdatedBuildFailed, build_failure)
        }
    }

    /// Run the configured build command, if any. Returns the failure reason,
    /// or `None` when there is nothing to build or the build succeeded.
    fn build(&self, target: &RepoTarget) -> Option<String> {
        let command = match (&target.build_command, target.builds()) {
            (Some(command), true) => command,
            _ => return None,
        };

        tracing::info!(repo = %target.name, command = %command, "building");
        let spec = CommandSpec::shell(command)
            .in_dir(&target.path)
            .with_timeout(self.timeout)
            .streamed();

        match self.runner.run(&spec) {
            Ok(output) if output.success() => None,
            Ok(output) => Some(format!("build failed: {}", output.failure_summary())),
            Err(err) => Some(format!("build could not run: {err}")),
        }
    }

    /// Compensating action: members were stopped but the cycle failed, so
    /// try to bring them back. Failure here is logged only — the next poll
    /// cycle is the retry mechanism.
    fn recover(&self, target: &RepoTarget, group: &ProcessGroup) {
        tracing::warn!(repo = %target.name, "recovering: restarting process group after failed cycle");
        if let Err(err) = group.apply(self.runner, &target.process_group, ProcessAction::Start) {
            tracing::error!(repo = %target.name, error = %err, "recovery restart incomplete");
        }
    }
}
