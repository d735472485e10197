//! YAML configuration file.
//!
//! # File layout
//!
//! ```text
//! ~/.pullwatch/
//!   config.yaml     (repository list + daemon settings)
//! ```
//!
//! # API pattern
//!
//! Path-dependent functions have two forms:
//! - `fn_at(home: &Path, …)` / explicit path — used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use the explicit forms.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{MemberId, RepoKind, RepoName, RepoTarget, RestartPolicy};

/// Seconds between poll cycles when the config does not say otherwise.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Process manager invoked for member stop/start when not configured.
pub const DEFAULT_PROCESS_MANAGER: &str = "pm2";

// ---------------------------------------------------------------------------
// Config records
// ---------------------------------------------------------------------------

/// One repository entry as written in `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    /// Absolute path to the git working copy.
    pub path: PathBuf,
    pub branch: String,
    /// Display name; defaults to the last path component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: RepoKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub process_group: Vec<MemberId>,
}

impl RepoEntry {
    /// Resolve this entry into an immutable per-cycle target.
    pub fn target(&self) -> RepoTarget {
        let name = match &self.name {
            Some(name) => RepoName::from(name.as_str()),
            None => RepoName::from(
                self.path
                    .file_name()
                    .unwrap_or(self.path.as_os_str())
                    .to_string_lossy()
                    .into_owned(),
            ),
        };
        RepoTarget {
            name,
            path: self.path.clone(),
            branch: self.branch.clone(),
            kind: self.kind,
            build_command: self.build_command.clone(),
            process_group: self.process_group.clone(),
        }
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between poll cycles.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Program invoked as `<process_manager> stop|start <member>`.
    #[serde(default = "default_process_manager")]
    pub process_manager: String,

    /// Bounded wait for any single external command, in seconds.
    /// Absent means wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<u64>,

    #[serde(default)]
    pub restart_policy: RestartPolicy,

    #[serde(default)]
    pub repositories: Vec<RepoEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
            process_manager: DEFAULT_PROCESS_MANAGER.to_string(),
            command_timeout: None,
            restart_policy: RestartPolicy::default(),
            repositories: vec![],
        }
    }
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_process_manager() -> String {
    DEFAULT_PROCESS_MANAGER.to_string()
}

impl Config {
    /// Resolve every entry into per-cycle targets, in config order.
    pub fn targets(&self) -> Vec<RepoTarget> {
        self.repositories.iter().map(RepoEntry::target).collect()
    }

    /// Reject configs that cannot be acted on. Tolerated-and-skipped cases
    /// (a `buildable` entry without a build command or members) are NOT
    /// errors; the orchestrator skips those phases.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.check_interval == 0 {
            problems.push("check_interval must be at least 1 second".to_string());
        }
        if self.process_manager.trim().is_empty() {
            problems.push("process_manager must not be empty".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for (idx, entry) in self.repositories.iter().enumerate() {
            if entry.branch.trim().is_empty() {
                problems.push(format!("repositories[{idx}]: branch must not be empty"));
            }
            if entry.path.as_os_str().is_empty() {
                problems.push(format!("repositories[{idx}]: path must not be empty"));
            }
            let name = entry.target().name;
            if !seen.insert(name.clone()) {
                problems.push(format!("repositories[{idx}]: duplicate name '{name}'"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.pullwatch/config.yaml` — pure, no I/O.
pub fn default_path_at(home: &Path) -> PathBuf {
    home.join(".pullwatch").join("config.yaml")
}

/// `default_path_at` convenience wrapper.
pub fn default_path() -> Result<PathBuf, ConfigError> {
    Ok(default_path_at(&home()?))
}

/// Resolve an optional explicit `--config` path against the home default.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_path(),
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate the config at `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load from an explicit path, or `<home>/.pullwatch/config.yaml`.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    load_at(&resolve_path(explicit)?)
}

/// Starter config printed by `pullwatch config example`.
pub fn example() -> &'static str {
    r#"# pullwatch configuration
check_interval: 300        # seconds between poll cycles
process_manager: pm2       # runs `pm2 stop <id>` / `pm2 start <id>`
# command_timeout: 600     # optional bound on any single external command
# restart_policy: always   # or: on-success

repositories:
  - path: /srv/docs
    branch: main

  - path: /srv/api
    branch: main
    kind: buildable
    build_command: npm run build
    process_group: ["7", "8"]
"#
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, yaml: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, yaml).expect("write config");
        path
    }

    #[test]
    fn default_path_is_under_dot_pullwatch() {
        let home = TempDir::new().expect("home");
        let path = default_path_at(home.path());
        assert!(path.ends_with(".pullwatch/config.yaml"));
    }

    #[test]
    fn load_missing_config_returns_not_found() {
        let dir = TempDir::new().expect("dir");
        let err = load_at(&dir.path().join("config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn load_malformed_yaml_reports_path() {
        let dir = TempDir::new().expect("dir");
        let path = write_config(&dir, "repositories: [not: closed");
        let err = load_at(&path).unwrap_err();
        match err {
            ConfigError::Parse { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn minimal_entry_gets_defaults() {
        let dir = TempDir::new().expect("dir");
        let path = write_config(
            &dir,
            "repositories:\n  - path: /srv/docs\n    branch: main\n",
        );
        let config = load_at(&path).expect("load");
        assert_eq!(config.check_interval, DEFAULT_CHECK_INTERVAL_SECS);
        assert_eq!(config.process_manager, "pm2");
        assert_eq!(config.restart_policy, RestartPolicy::Always);

        let targets = config.targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, RepoName::from("docs"));
        assert_eq!(targets[0].kind, RepoKind::Standard);
        assert!(targets[0].process_group.is_empty());
    }

    #[test]
    fn buildable_entry_roundtrips() {
        let dir = TempDir::new().expect("dir");
        let path = write_config(
            &dir,
            concat!(
                "repositories:\n",
                "  - path: /srv/api\n",
                "    branch: release\n",
                "    kind: buildable\n",
                "    build_command: npm run build\n",
                "    process_group: [\"7\", \"8\"]\n",
            ),
        );
        let config = load_at(&path).expect("load");
        let target = &config.targets()[0];
        assert_eq!(target.kind, RepoKind::Buildable);
        assert_eq!(target.build_command.as_deref(), Some("npm run build"));
        assert_eq!(
            target.process_group,
            vec![MemberId::from("7"), MemberId::from("8")]
        );
        assert!(target.manages_processes());
    }

    #[test]
    fn explicit_name_overrides_path_derivation() {
        let entry = RepoEntry {
            path: PathBuf::from("/srv/api"),
            branch: "main".to_string(),
            name: Some("backend".to_string()),
            kind: RepoKind::Standard,
            build_command: None,
            process_group: vec![],
        };
        assert_eq!(entry.target().name, RepoName::from("backend"));
    }

    #[rstest]
    #[case("check_interval: 0\nrepositories: []\n", "check_interval")]
    #[case(
        "process_manager: \"\"\nrepositories: []\n",
        "process_manager"
    )]
    #[case(
        "repositories:\n  - path: /srv/a\n    branch: \"\"\n",
        "branch"
    )]
    fn invalid_configs_are_rejected(#[case] yaml: &str, #[case] needle: &str) {
        let dir = TempDir::new().expect("dir");
        let path = write_config(&dir, yaml);
        let err = load_at(&path).unwrap_err();
        assert!(
            err.to_string().contains(needle),
            "error should mention {needle}: {err}"
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = TempDir::new().expect("dir");
        let path = write_config(
            &dir,
            concat!(
                "repositories:\n",
                "  - path: /srv/api\n",
                "    branch: main\n",
                "  - path: /other/api\n",
                "    branch: main\n",
            ),
        );
        let err = load_at(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate name 'api'"));
    }

    #[test]
    fn example_config_parses_and_validates() {
        let config: Config = serde_yaml::from_str(example()).expect("parse example");
        config.validate().expect("validate example");
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[1].kind, RepoKind::Buildable);
    }

    #[test]
    fn buildable_without_members_validates() {
        // Tolerated: the build/restart phases are skipped, not an error.
        let dir = TempDir::new().expect("dir");
        let path = write_config(
            &dir,
            concat!(
                "repositories:\n",
                "  - path: /srv/api\n",
                "    branch: main\n",
                "    kind: buildable\n",
            ),
        );
        let config = load_at(&path).expect("load");
        assert!(!config.targets()[0].manages_processes());
    }
}
