//! Command-sequence tests for the update orchestrator.
//!
//! A scripted runner records every external command and answers
//! `git rev-parse` from configurable heads, so each test asserts the exact
//! commands issued and their order.

use std::path::PathBuf;
use std::sync::Mutex;

use pullwatch_core::config::{Config, RepoEntry};
use pullwatch_core::types::{CycleOutcome, MemberId, RepoKind, RepoName, RepoTarget, RestartPolicy};
use pullwatch_exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};
use pullwatch_sync::{pipeline, Orchestrator, Scope};
use tempfile::TempDir;

const LOCAL_HEAD: &str = "abc123abc123abc123abc123abc123abc123abc1";
const REMOTE_HEAD: &str = "def456def456def456def456def456def456def4";

/// Records every command; simulates a repository whose local head moves to
/// the remote head when `git pull` succeeds.
struct RecordingRunner {
    seen: Mutex<Vec<CommandSpec>>,
    local: Mutex<String>,
    remote: String,
    build_exit: i32,
    /// Display-line prefixes that exit non-zero.
    fail: Vec<&'static str>,
}

impl RecordingRunner {
    fn new(local: &str, remote: &str) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            local: Mutex::new(local.to_string()),
            remote: remote.to_string(),
            build_exit: 0,
            fail: vec![],
        }
    }

    fn with_build_exit(mut self, code: i32) -> Self {
        self.build_exit = code;
        self
    }

    fn failing(mut self, prefixes: Vec<&'static str>) -> Self {
        self.fail = prefixes;
        self
    }

    fn commands(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(CommandSpec::display_line)
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.seen.lock().unwrap().push(spec.clone());
        let display = spec.display_line();

        if self.fail.iter().any(|p| display.starts_with(p)) {
            return Ok(CommandOutput {
                exit_code: Some(1),
                stdout: vec![],
                stderr: vec!["simulated failure".to_string()],
            });
        }

        let mut stdout = Vec::new();
        match spec.args.first().map(String::as_str) {
            Some("rev-parse") => {
                let head = if spec.args[1] == "HEAD" {
                    self.local.lock().unwrap().clone()
                } else {
                    self.remote.clone()
                };
                stdout.push(head);
            }
            Some("pull") => {
                *self.local.lock().unwrap() = self.remote.clone();
            }
            _ => {}
        }

        let exit_code = if spec.program == "sh" {
            self.build_exit
        } else {
            0
        };
        Ok(CommandOutput {
            exit_code: Some(exit_code),
            stdout,
            stderr: vec![],
        })
    }
}

// ─── Fixtures ─────────────────────────────────────────────────────────────

/// A directory that passes the working-copy check.
fn work_tree() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    std::fs::create_dir(dir.path().join(".git")).expect("mkdir .git");
    dir
}

fn standard_target(path: PathBuf) -> RepoTarget {
    RepoTarget {
        name: RepoName::from("repo"),
        path,
        branch: "main".to_string(),
        kind: RepoKind::Standard,
        build_command: None,
        process_group: vec![],
    }
}

fn buildable_target(path: PathBuf) -> RepoTarget {
    RepoTarget {
        name: RepoName::from("repo"),
        path,
        branch: "main".to_string(),
        kind: RepoKind::Buildable,
        build_command: Some("npm run build".to_string()),
        process_group: vec![MemberId::from("7"), MemberId::from("8")],
    }
}

fn config() -> Config {
    Config::default()
}

fn count_of(commands: &[String], needle: &str) -> usize {
    commands.iter().filter(|c| c.as_str() == needle).count()
}

// ─── Scenarios ────────────────────────────────────────────────────────────

#[test]
fn unchanged_repo_issues_nothing_beyond_detection() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, LOCAL_HEAD);
    let target = standard_target(dir.path().to_path_buf());

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::Unchanged);
    assert_eq!(
        runner.commands(),
        vec![
            "git fetch origin main",
            "git rev-parse HEAD",
            "git rev-parse origin/main",
        ]
    );
}

#[test]
fn changed_standard_repo_checks_out_and_pulls_only() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD);
    let target = standard_target(dir.path().to_path_buf());

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::Updated);
    assert_eq!(
        runner.commands(),
        vec![
            "git fetch origin main",
            "git rev-parse HEAD",
            "git rev-parse origin/main",
            "git checkout main",
            "git pull origin main",
        ]
    );
}

#[test]
fn buildable_repo_runs_the_full_sequence_in_order() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD);
    let target = buildable_target(dir.path().to_path_buf());

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::Updated);
    assert_eq!(
        runner.commands(),
        vec![
            "git fetch origin main",
            "git rev-parse HEAD",
            "git rev-parse origin/main",
            "pm2 stop 7",
            "pm2 stop 8",
            "git checkout main",
            "git pull origin main",
            "sh -c npm run build",
            "pm2 start 7",
            "pm2 start 8",
        ]
    );
}

#[test]
fn failed_build_still_starts_every_member_exactly_once() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD).with_build_exit(1);
    let target = buildable_target(dir.path().to_path_buf());

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::UpdatedBuildFailed);
    let commands = runner.commands();
    // Same sequence through the build step, then the starts still happen.
    assert_eq!(commands[7], "sh -c npm run build");
    assert_eq!(count_of(&commands, "pm2 start 7"), 1);
    assert_eq!(count_of(&commands, "pm2 start 8"), 1);
}

#[test]
fn stops_happen_strictly_before_checkout_and_pull() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD);
    let target = buildable_target(dir.path().to_path_buf());

    Orchestrator::new(&runner, &config()).run_repo(&target);

    let commands = runner.commands();
    let pos = |needle: &str| {
        commands
            .iter()
            .position(|c| c == needle)
            .unwrap_or_else(|| panic!("missing command: {needle}"))
    };
    assert!(pos("pm2 stop 7") < pos("git checkout main"));
    assert!(pos("pm2 stop 8") < pos("git checkout main"));
    assert!(pos("git checkout main") < pos("git pull origin main"));
    assert!(pos("git pull origin main") < pos("sh -c npm run build"));
    assert!(pos("sh -c npm run build") < pos("pm2 start 7"));
}

#[test]
fn failed_member_stop_does_not_short_circuit_siblings() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD).failing(vec!["pm2 stop 7"]);
    let target = buildable_target(dir.path().to_path_buf());

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    // The update proceeds; a stop failure is not a hard orchestration failure.
    assert_eq!(report.outcome, CycleOutcome::Updated);
    let commands = runner.commands();
    assert_eq!(count_of(&commands, "pm2 stop 8"), 1);
    assert_eq!(count_of(&commands, "pm2 start 7"), 1);
}

#[test]
fn second_run_without_remote_change_is_a_no_op() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD);
    let target = buildable_target(dir.path().to_path_buf());
    let orchestrator = Orchestrator::new(&runner, &config());

    let first = orchestrator.run_repo(&target);
    assert_eq!(first.outcome, CycleOutcome::Updated);

    let commands_after_first = runner.commands().len();
    let second = orchestrator.run_repo(&target);
    assert_eq!(second.outcome, CycleOutcome::Unchanged);

    // Second pass: fetch + two rev-parses, nothing side-effecting.
    let all = runner.commands();
    let second_commands: Vec<&str> = all[commands_after_first..]
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(
        second_commands,
        vec![
            "git fetch origin main",
            "git rev-parse HEAD",
            "git rev-parse origin/main",
        ]
    );
}

#[test]
fn pull_failure_after_stop_triggers_compensating_start() {
    let dir = work_tree();
    let runner =
        RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD).failing(vec!["git pull origin main"]);
    let target = buildable_target(dir.path().to_path_buf());

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::SyncFailed);
    let commands = runner.commands();
    // Members were stopped, so recovery starts them again; no build runs.
    assert_eq!(count_of(&commands, "pm2 start 7"), 1);
    assert_eq!(count_of(&commands, "pm2 start 8"), 1);
    assert!(!commands.iter().any(|c| c.starts_with("sh -c")));
}

#[test]
fn fetch_failure_aborts_before_any_process_command() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD).failing(vec!["git fetch"]);
    let target = buildable_target(dir.path().to_path_buf());

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::SyncFailed);
    assert_eq!(runner.commands(), vec!["git fetch origin main"]);
}

#[test]
fn missing_work_tree_fails_without_running_anything() {
    let dir = TempDir::new().expect("tempdir");
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD);
    let target = standard_target(dir.path().join("gone"));

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::SyncFailed);
    assert!(runner.commands().is_empty());
}

#[test]
fn on_success_policy_skips_start_after_failed_build() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD).with_build_exit(1);
    let target = buildable_target(dir.path().to_path_buf());
    let config = Config {
        restart_policy: RestartPolicy::OnSuccess,
        ..Config::default()
    };

    let report = Orchestrator::new(&runner, &config).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::UpdatedBuildFailed);
    assert!(!runner.commands().iter().any(|c| c.starts_with("pm2 start")));
}

#[test]
fn buildable_without_members_skips_process_commands() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD);
    let mut target = buildable_target(dir.path().to_path_buf());
    target.process_group.clear();

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::Updated);
    let commands = runner.commands();
    assert!(!commands.iter().any(|c| c.starts_with("pm2")));
    assert_eq!(count_of(&commands, "sh -c npm run build"), 1);
}

#[test]
fn buildable_without_build_command_still_cycles_members() {
    let dir = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, REMOTE_HEAD);
    let mut target = buildable_target(dir.path().to_path_buf());
    target.build_command = None;

    let report = Orchestrator::new(&runner, &config()).run_repo(&target);

    assert_eq!(report.outcome, CycleOutcome::Updated);
    let commands = runner.commands();
    assert!(!commands.iter().any(|c| c.starts_with("sh -c")));
    assert_eq!(count_of(&commands, "pm2 stop 7"), 1);
    assert_eq!(count_of(&commands, "pm2 start 7"), 1);
}

// ─── Sweep isolation ──────────────────────────────────────────────────────

#[test]
fn one_repository_failure_never_aborts_the_sweep() {
    let good = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, LOCAL_HEAD);
    let config = Config {
        repositories: vec![
            RepoEntry {
                path: PathBuf::from("/nonexistent/broken"),
                branch: "main".to_string(),
                name: None,
                kind: RepoKind::Standard,
                build_command: None,
                process_group: vec![],
            },
            RepoEntry {
                path: good.path().to_path_buf(),
                branch: "main".to_string(),
                name: Some("healthy".to_string()),
                kind: RepoKind::Standard,
                build_command: None,
                process_group: vec![],
            },
        ],
        ..Config::default()
    };

    let reports = pipeline::run(&config, Scope::All, &runner).expect("sweep");

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].outcome, CycleOutcome::SyncFailed);
    assert_eq!(reports[1].outcome, CycleOutcome::Unchanged);
    assert_eq!(reports[1].repo, RepoName::from("healthy"));
}

#[test]
fn scoped_sweep_runs_only_the_named_repository() {
    let one = work_tree();
    let two = work_tree();
    let runner = RecordingRunner::new(LOCAL_HEAD, LOCAL_HEAD);
    let config = Config {
        repositories: vec![
            RepoEntry {
                path: one.path().to_path_buf(),
                branch: "main".to_string(),
                name: Some("one".to_string()),
                kind: RepoKind::Standard,
                build_command: None,
                process_group: vec![],
            },
            RepoEntry {
                path: two.path().to_path_buf(),
                branch: "main".to_string(),
                name: Some("two".to_string()),
                kind: RepoKind::Standard,
                build_command: None,
                process_group: vec![],
            },
        ],
        ..Config::default()
    };

    let reports = pipeline::run(&config, Scope::Repo("two".to_string()), &runner).expect("sweep");

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].repo, RepoName::from("two"));
}
