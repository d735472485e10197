//! Git plumbing over the `git` CLI.
//!
//! Every invocation carries the repository path as an explicit working
//! directory. The upstream remote is always `origin` — a deliberate
//! single-upstream simplification.

use std::time::Duration;

use pullwatch_core::types::RepoTarget;
use pullwatch_exec::{CommandOutput, CommandRunner, CommandSpec};

use crate::error::SyncError;

/// The fixed upstream remote name.
pub const REMOTE: &str = "origin";

/// What detection observed before any local state was touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    /// Commit id of the local branch head (`HEAD`).
    pub local: String,
    /// Commit id of the freshly fetched remote branch head.
    pub remote: String,
}

impl Detected {
    pub fn changed(&self) -> bool {
        self.local != self.remote
    }
}

/// Result of one full synchronization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Did the local head differ from the remote head before the pull.
    pub changed: bool,
    pub local: String,
    pub remote: String,
}

/// One repository's git operations, bound to its target record.
pub struct GitRepo<'a> {
    target: &'a RepoTarget,
    timeout: Option<Duration>,
}

impl<'a> GitRepo<'a> {
    pub fn new(target: &'a RepoTarget, timeout: Option<Duration>) -> Self {
        Self { target, timeout }
    }

    fn spec(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new("git", args.iter().copied())
            .in_dir(&self.target.path)
            .with_timeout(self.timeout)
    }

    /// Step 1 of the sync algorithm: the path must exist and hold a working
    /// copy (`.git` directory, or file for linked worktrees).
    pub fn ensure_work_tree(&self) -> Result<(), SyncError> {
        let path = &self.target.path;
        if !path.is_dir() || !path.join(".git").exists() {
            return Err(SyncError::Path { path: path.clone() });
        }
        Ok(())
    }

    /// `git fetch origin <branch>`.
    pub fn fetch(&self, runner: &dyn CommandRunner) -> Result<(), SyncError> {
        let output = runner.run(&self.spec(&["fetch", REMOTE, &self.target.branch]))?;
        if output.success() {
            Ok(())
        } else {
            Err(SyncError::Fetch {
                branch: self.target.branch.clone(),
                detail: output.failure_summary(),
            })
        }
    }

    /// Resolve a revision to a commit id via `git rev-parse`.
    fn rev_parse(&self, runner: &dyn CommandRunner, rev: &str) -> Result<String, SyncError> {
        let output = runner.run(&self.spec(&["rev-parse", rev]))?;
        if !output.success() {
            return Err(SyncError::RevParse {
                rev: rev.to_string(),
                detail: output.failure_summary(),
            });
        }
        match output.first_line() {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(SyncError::RevParse {
                rev: rev.to_string(),
                detail: "rev-parse produced no output".to_string(),
            }),
        }
    }

    /// Steps 1–3: validate the working copy, fetch, compare heads.
    /// Touches no local state beyond git's own fetch bookkeeping.
    pub fn detect(&self, runner: &dyn CommandRunner) -> Result<Detected, SyncError> {
        self.ensure_work_tree()?;
        self.fetch(runner)?;
        let local = self.rev_parse(runner, "HEAD")?;
        let remote = self.rev_parse(runner, &format!("{REMOTE}/{}", self.target.branch))?;
        Ok(Detected { local, remote })
    }

    /// Step 5: checkout the branch (the working copy may have drifted to a
    /// different branch or a detached head), then fast-sync it via pull.
    /// A diverged local branch makes the pull fail; that failure propagates.
    pub fn apply(&self, runner: &dyn CommandRunner) -> Result<(), SyncError> {
        let branch = &self.target.branch;

        let checkout = runner.run(&self.spec(&["checkout", branch]))?;
        if !checkout.success() {
            return Err(SyncError::Checkout {
                branch: branch.clone(),
                detail: checkout.failure_summary(),
            });
        }

        let pull = runner.run(&self.spec(&["pull", REMOTE, branch]))?;
        if !pull.success() {
            return Err(SyncError::Pull {
                branch: branch.clone(),
                detail: pull.failure_summary(),
            });
        }
        log_pull_result(&pull);
        Ok(())
    }

    /// Full synchronization: detect, and apply only when heads differ.
    pub fn sync(&self, runner: &dyn CommandRunner) -> Result<SyncOutcome, SyncError> {
        let detected = self.detect(runner)?;
        if !detected.changed() {
            return Ok(SyncOutcome {
                changed: false,
                local: detected.local,
                remote: detected.remote,
            });
        }
        self.apply(runner)?;
        Ok(SyncOutcome {
            changed: true,
            local: detected.local,
            remote: detected.remote,
        })
    }
}

fn log_pull_result(pull: &CommandOutput) {
    if let Some(line) = pull.stdout.last() {
        tracing::debug!("pull: {}", line.trim());
    }
}

/// First 12 characters of a commit id, for logs and status lines.
pub fn short_id(commit: &str) -> &str {
    &commit[..commit.len().min(12)]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
