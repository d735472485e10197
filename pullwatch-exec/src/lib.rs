//! # pullwatch-exec
//!
//! External command execution and process-group control.
//!
//! [`CommandRunner`] is implemented by [`SystemRunner`] in production and by
//! scripted runners in tests; [`ProcessGroup`] drives the external process
//! manager through it.

pub mod error;
pub mod process_group;
pub mod runner;

pub use error::{ExecError, ProcessControlError};
pub use process_group::ProcessGroup;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
