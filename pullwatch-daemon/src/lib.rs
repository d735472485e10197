//! Daemon runtime: poll loop + sweep processor + socket server.

mod error;
pub mod log_rotation;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod systemd;

pub use error::DaemonError;
pub use protocol::{
    request_check, request_status, request_stop, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{run, start_blocking, OutcomeCache, RepoStatus, SweepSummary};
pub use systemd::{generate_unit, install as install_systemd, uninstall as uninstall_systemd};
