//! External command execution.
//!
//! [`CommandRunner`] is the seam between orchestration and the outside
//! world (git, the build, the process manager). Production code uses
//! [`SystemRunner`]; tests substitute a scripted runner and assert on the
//! exact command sequence.
//!
//! Pipe handling: stderr is drained on a background thread while stdout is
//! drained on its own thread, so a child that fills one pipe while the other
//! is idle can never deadlock against us. In streaming mode every line is
//! logged as it arrives, which is how long builds surface progress.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::ExecError;

/// Poll granularity for the bounded wait.
const WAIT_POLL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

/// One external command: program, arguments, working directory.
///
/// The working directory is always explicit — nothing in pullwatch ever
/// changes the process-wide current directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// `None` inherits the daemon's directory (process-manager calls);
    /// git and build commands always set this to the repository path.
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Log output line-by-line as it arrives (long builds).
    pub stream: bool,
}

impl CommandSpec {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout: None,
            stream: false,
        }
    }

    /// A shell command line, run as `sh -c <command>`.
    pub fn shell(command: &str) -> Self {
        Self::new("sh", ["-c", command])
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn streamed(mut self) -> Self {
        self.stream = true;
        self
    }

    /// `program arg arg …` for logs and error messages.
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

// ---------------------------------------------------------------------------
// CommandOutput
// ---------------------------------------------------------------------------

/// Captured result of a launched command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandOutput {
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// First stdout line, trimmed — where single-value answers
    /// (`git rev-parse`) come from.
    pub fn first_line(&self) -> Option<&str> {
        self.stdout.first().map(|s| s.trim())
    }

    /// Short diagnostic for error messages: exit code plus the tail of
    /// stderr (or stdout when stderr is empty).
    pub fn failure_summary(&self) -> String {
        let code = match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "killed by signal".to_string(),
        };
        let detail = if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        match detail.last() {
            Some(line) => format!("{code}: {}", line.trim()),
            None => code,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Executes external commands. No retries — retry policy belongs to callers.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError>;
}

/// Runs commands via `std::process` with both pipes captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        let mut command = std::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(cwd) = &spec.cwd {
            if !cwd.is_dir() {
                return Err(ExecError::Workdir { path: cwd.clone() });
            }
            command.current_dir(cwd);
        }

        tracing::debug!(command = %spec.display_line(), "running external command");

        let mut child = command.spawn().map_err(|source| ExecError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdout_lines = drain_lines(child.stdout.take(), spec.stream, &spec.program, false);
        let stderr_lines = drain_lines(child.stderr.take(), spec.stream, &spec.program, true);

        let status = wait_with_deadline(&mut child, spec)?;

        let stdout = join_lines(stdout_lines);
        let stderr = join_lines(stderr_lines);

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Drain one pipe to completion on its own thread, collecting lines.
fn drain_lines(
    pipe: Option<impl Read + Send + 'static>,
    stream: bool,
    program: &str,
    is_stderr: bool,
) -> Option<thread::JoinHandle<Vec<String>>> {
    let pipe = pipe?;
    let program = program.to_string();
    Some(thread::spawn(move || {
        let mut lines = Vec::new();
        for line in BufReader::new(pipe).lines() {
            let Ok(line) = line else { break };
            if stream {
                if is_stderr {
                    tracing::warn!(source = %program, "{line}");
                } else {
                    tracing::info!(source = %program, "{line}");
                }
            }
            lines.push(line);
        }
        lines
    }))
}

fn join_lines(handle: Option<thread::JoinHandle<Vec<String>>>) -> Vec<String> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Wait for the child, enforcing the command's bounded wait when present.
/// On expiry the child is killed and reaped before the error returns, so
/// reader threads always reach EOF.
fn wait_with_deadline(child: &mut Child, spec: &CommandSpec) -> Result<ExitStatus, ExecError> {
    let io_err = |source| ExecError::Io {
        program: spec.program.clone(),
        source,
    };

    let Some(timeout) = spec.timeout else {
        return child.wait().map_err(io_err);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::Timeout {
                program: spec.program.clone(),
                timeout_secs: timeout.as_secs(),
            });
        }
        thread::sleep(WAIT_POLL);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
