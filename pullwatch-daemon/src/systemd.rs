//! systemd user-unit management for the daemon.
//!
//! `pullwatch daemon install` writes `~/.config/systemd/user/pullwatch.service`
//! and enables it with `systemctl --user`; the unit keeps the foreground
//! `pullwatch daemon start` alive. Daemonization itself is systemd's job —
//! the daemon process never forks.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{io_err, DaemonError};
use crate::paths::{socket_path, systemd_unit_path, SERVICE_UNIT};

/// Render the user unit pointing at `binary_path`.
pub fn generate_unit(binary_path: &Path, config_path: &Path) -> String {
    format!(
        r#"[Unit]
Description=pullwatch git auto-pull daemon
After=network-online.target

[Service]
ExecStart={binary} daemon start --config {config}
Restart=always
RestartSec=5

[Install]
WantedBy=default.target
"#,
        binary = binary_path.display(),
        config = config_path.display(),
    )
}

/// Install the unit and enable it immediately for the current user.
pub fn install(home: &Path, config_path: &Path) -> Result<PathBuf, DaemonError> {
    ensure_linux()?;

    let unit_dir = crate::paths::systemd_user_dir(home);
    if !unit_dir.exists() {
        fs::create_dir_all(&unit_dir).map_err(|e| io_err(&unit_dir, e))?;
    }
    let logs = crate::paths::logs_dir(home);
    if !logs.exists() {
        fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;
    }
    let run = crate::paths::run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }

    let binary = std::env::current_exe()
        .unwrap_or_else(|_| PathBuf::from("/usr/local/bin/pullwatch"));
    let unit = systemd_unit_path(home);
    fs::write(&unit, generate_unit(&binary, config_path)).map_err(|e| io_err(&unit, e))?;

    run_systemctl(&["daemon-reload"], false)?;
    run_systemctl(&["enable", "--now", SERVICE_UNIT], false)?;

    Ok(unit)
}

/// Disable the service and remove the unit file.
pub fn uninstall(home: &Path) -> Result<(), DaemonError> {
    ensure_linux()?;

    let unit = systemd_unit_path(home);
    if unit.exists() {
        let _ = run_systemctl(&["disable", "--now", SERVICE_UNIT], true);
        fs::remove_file(&unit).map_err(|e| io_err(&unit, e))?;
        run_systemctl(&["daemon-reload"], false)?;
    }

    let socket = socket_path(home);
    if socket.exists() {
        let _ = fs::remove_file(socket);
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn ensure_linux() -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn ensure_linux() -> Result<(), DaemonError> {
    Err(DaemonError::Systemd(
        "systemd management is only supported on Linux".to_string(),
    ))
}

fn run_systemctl(args: &[&str], ignore_failure: bool) -> Result<(), DaemonError> {
    let output = Command::new("systemctl")
        .arg("--user")
        .args(args)
        .output()
        .map_err(|e| io_err("systemctl", e))?;

    if output.status.success() || ignore_failure {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Err(DaemonError::Systemd(format!(
        "systemctl --user {} failed (status {}): {} {}",
        args.join(" "),
        output.status,
        stdout,
        stderr
    )))
}
