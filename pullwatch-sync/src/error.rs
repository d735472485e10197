//! Error types for pullwatch-sync.

use std::path::PathBuf;

use thiserror::Error;

use pullwatch_exec::ExecError;

/// All errors that can arise from repository synchronization.
///
/// Every variant means the sync was aborted with no successful pull claimed;
/// the orchestrator never proceeds on one of these believing the working
/// copy changed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local path is missing or is not a git working copy.
    #[error("not a git working copy: {path}")]
    Path { path: PathBuf },

    /// `git fetch origin <branch>` failed (network, auth, unknown branch).
    #[error("fetch of origin/{branch} failed: {detail}")]
    Fetch { branch: String, detail: String },

    /// `git rev-parse <rev>` failed or produced no commit id.
    #[error("could not resolve '{rev}': {detail}")]
    RevParse { rev: String, detail: String },

    /// `git checkout <branch>` failed.
    #[error("checkout of {branch} failed: {detail}")]
    Checkout { branch: String, detail: String },

    /// `git pull origin <branch>` failed — includes merge conflicts from a
    /// diverged local branch, which are reported, never auto-resolved.
    #[error("pull of origin/{branch} failed: {detail}")]
    Pull { branch: String, detail: String },

    /// The git command itself could not be run (spawn/timeout/io).
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// A scoped pipeline run named a repository that is not configured.
    #[error("no configured repository named '{name}'")]
    UnknownRepo { name: String },
}
