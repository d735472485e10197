use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SERVICE_UNIT: &str = "pullwatch.service";

pub const DAEMON_STDOUT_LOG: &str = "daemon.log";
pub const DAEMON_STDERR_LOG: &str = "daemon-err.log";
pub const DAEMON_SOCKET: &str = "daemon.sock";

/// How often the rotation task looks at the log files.
pub const ROTATION_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub fn pullwatch_root(home: &Path) -> PathBuf {
    home.join(".pullwatch")
}

pub fn run_dir(home: &Path) -> PathBuf {
    pullwatch_root(home).join("run")
}

pub fn socket_path(home: &Path) -> PathBuf {
    pullwatch_root(home).join(DAEMON_SOCKET)
}

pub fn logs_dir(home: &Path) -> PathBuf {
    pullwatch_root(home).join("logs")
}

pub fn stdout_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(DAEMON_STDOUT_LOG)
}

pub fn stderr_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(DAEMON_STDERR_LOG)
}

pub fn systemd_user_dir(home: &Path) -> PathBuf {
    home.join(".config").join("systemd").join("user")
}

pub fn systemd_unit_path(home: &Path) -> PathBuf {
    systemd_user_dir(home).join(SERVICE_UNIT)
}
