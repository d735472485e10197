//! Domain types for pullwatch.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem
//! paths. Everything that crosses the config file or the daemon status
//! boundary is serializable via serde.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed display name for a managed repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoName(pub String);

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepoName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// An opaque process-manager member id (a pm2 id or name, verbatim).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(pub String);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What pullwatch does with a repository after pulling changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    /// Pull only.
    #[default]
    Standard,
    /// Pull, then build and restart the configured process group.
    Buildable,
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoKind::Standard => write!(f, "standard"),
            RepoKind::Buildable => write!(f, "buildable"),
        }
    }
}

/// One action against a process-group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessAction {
    Stop,
    Start,
    Restart,
}

impl ProcessAction {
    /// The subcommand the external process manager expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessAction::Stop => "stop",
            ProcessAction::Start => "start",
            ProcessAction::Restart => "restart",
        }
    }
}

impl fmt::Display for ProcessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether process-group members are started after a failed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Start members regardless of build outcome (original behavior).
    #[default]
    Always,
    /// Skip the restart when the build failed.
    OnSuccess,
}

/// Outcome of one repository's orchestration pass, for reporting only.
///
/// Nothing feeds back into later cycles; each poll is independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleOutcome {
    /// Local head already matched the remote head.
    Unchanged,
    /// Changes pulled; build (if any) and restart succeeded.
    Updated,
    /// Changes pulled but the build failed; members were handled per policy.
    UpdatedBuildFailed,
    /// Fetch, checkout, or pull failed; no local state assumed changed.
    SyncFailed,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Unchanged => write!(f, "unchanged"),
            CycleOutcome::Updated => write!(f, "updated"),
            CycleOutcome::UpdatedBuildFailed => write!(f, "updated-build-failed"),
            CycleOutcome::SyncFailed => write!(f, "sync-failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One managed repository, constructed from config once per poll cycle and
/// immutable for the duration of one orchestration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTarget {
    pub name: RepoName,
    /// Absolute path to the git working copy.
    pub path: PathBuf,
    pub branch: String,
    pub kind: RepoKind,
    /// Build command, run through `sh -c` in the repository directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    /// Process-manager members stopped before and started after an update,
    /// in this order.
    #[serde(default)]
    pub process_group: Vec<MemberId>,
}

impl RepoTarget {
    /// A `buildable` target only enters the build/restart phases when both
    /// a build command and at least one member are configured; anything
    /// less degrades to pull-only without being an error.
    pub fn manages_processes(&self) -> bool {
        self.kind == RepoKind::Buildable && !self.process_group.is_empty()
    }

    pub fn builds(&self) -> bool {
        self.kind == RepoKind::Buildable && self.build_command.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(RepoName::from("api").to_string(), "api");
        assert_eq!(MemberId::from("7").to_string(), "7");
    }

    #[test]
    fn newtype_equality() {
        let a = MemberId::from("web");
        let b = MemberId::from(String::from("web"));
        assert_eq!(a, b);
    }

    #[test]
    fn repo_kind_serde_is_lowercase() {
        let yaml = serde_yaml::to_string(&RepoKind::Buildable).expect("serialize");
        assert_eq!(yaml.trim(), "buildable");
        let parsed: RepoKind = serde_yaml::from_str("standard").expect("deserialize");
        assert_eq!(parsed, RepoKind::Standard);
    }

    #[test]
    fn outcome_display_matches_reporting_surface() {
        assert_eq!(CycleOutcome::Unchanged.to_string(), "unchanged");
        assert_eq!(CycleOutcome::Updated.to_string(), "updated");
        assert_eq!(
            CycleOutcome::UpdatedBuildFailed.to_string(),
            "updated-build-failed"
        );
        assert_eq!(CycleOutcome::SyncFailed.to_string(), "sync-failed");
    }

    #[test]
    fn process_action_subcommands() {
        assert_eq!(ProcessAction::Stop.as_str(), "stop");
        assert_eq!(ProcessAction::Start.as_str(), "start");
        assert_eq!(ProcessAction::Restart.as_str(), "restart");
    }

    #[test]
    fn buildable_without_members_degrades_to_pull_only() {
        let target = RepoTarget {
            name: RepoName::from("api"),
            path: PathBuf::from("/srv/api"),
            branch: "main".to_string(),
            kind: RepoKind::Buildable,
            build_command: Some("npm run build".to_string()),
            process_group: vec![],
        };
        assert!(target.builds());
        assert!(!target.manages_processes());
    }
}
