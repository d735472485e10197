//! Process-group control through the external process manager's CLI.

use std::time::Duration;

use pullwatch_core::types::{MemberId, ProcessAction};

use crate::error::ProcessControlError;
use crate::runner::{CommandRunner, CommandSpec};

/// Issues `<manager> stop|start|restart <member>` per member, in order.
///
/// Best-effort: a member that fails never blocks its siblings; the call
/// reports failure afterwards if any member failed. Whether stopping an
/// already-stopped member counts as failure is the external tool's call —
/// the controller reports whatever it reports.
#[derive(Debug, Clone)]
pub struct ProcessGroup {
    manager: String,
    timeout: Option<Duration>,
}

impl ProcessGroup {
    pub fn new(manager: impl Into<String>) -> Self {
        Self {
            manager: manager.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply `action` to every member. Returns `Err` listing the members
    /// that failed, after all of them were attempted.
    pub fn apply(
        &self,
        runner: &dyn CommandRunner,
        members: &[MemberId],
        action: ProcessAction,
    ) -> Result<(), ProcessControlError> {
        let mut failed: Vec<&MemberId> = Vec::new();

        for member in members {
            let spec = CommandSpec::new(self.manager.as_str(), [action.as_str(), member.0.as_str()])
                .with_timeout(self.timeout);

            match runner.run(&spec) {
                Ok(output) if output.success() => {
                    tracing::info!(member = %member, action = %action, "process-group member handled");
                }
                Ok(output) => {
                    tracing::error!(
                        member = %member,
                        action = %action,
                        detail = %output.failure_summary(),
                        "process manager reported failure"
                    );
                    failed.push(member);
                }
                Err(err) => {
                    tracing::error!(
                        member = %member,
                        action = %action,
                        error = %err,
                        "could not invoke process manager"
                    );
                    failed.push(member);
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ProcessControlError {
                action: action.as_str(),
                members: failed
                    .iter()
                    .map(|m| m.0.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
