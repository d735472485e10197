//! Error types for pullwatch-exec.

use std::path::PathBuf;

use thiserror::Error;

/// Failures to run an external command at all.
///
/// A command that launches and exits non-zero is NOT an `ExecError`; it comes
/// back as a [`crate::CommandOutput`] with `success() == false` and the
/// caller decides what that means.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The requested working directory does not exist.
    #[error("working directory missing: {path}")]
    Workdir { path: PathBuf },

    /// The command could not be launched (binary not found, permission denied).
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The bounded wait expired; the child was killed.
    #[error("'{program}' did not finish within {timeout_secs}s and was killed")]
    Timeout { program: String, timeout_secs: u64 },

    /// I/O failure while waiting on or reading from the child.
    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// One or more process-group members could not be stopped/started.
///
/// The controller is best-effort: every member is attempted before this is
/// returned, and `members` lists exactly the ones that failed.
#[derive(Debug, Error)]
#[error("failed to {action} process-group member(s): {members}")]
pub struct ProcessControlError {
    pub action: &'static str,
    /// Comma-joined ids of the members whose action failed.
    pub members: String,
}
