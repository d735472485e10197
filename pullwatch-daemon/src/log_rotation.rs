//! Size-based rotation for the daemon's log files.
//!
//! `daemon.log` and `daemon-err.log` are rotated once they pass 10 MiB,
//! keeping numbered backups (`daemon.log.1` is the newest) up to a fixed
//! count. The daemon never stops logging: a fresh empty file replaces the
//! live log immediately after the rename.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotate once a log file reaches this size (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Number of numbered backups kept per log file.
pub const MAX_BACKUPS: usize = 5;

/// Rotate `log_path` if it has reached `max_bytes`.
///
/// Returns `true` when a rotation happened. A missing log file is not an
/// error — the daemon may simply not have logged yet.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_backups: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    // Drop the oldest backup, then shift the rest up one slot.
    let oldest = backup_path(log_path, max_backups);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_backups).rev() {
        let from = backup_path(log_path, n);
        if from.exists() {
            fs::rename(&from, backup_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, backup_path(log_path, 1))?;

    // Leave a fresh empty file so the daemon always has a writable path.
    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;

    Ok(true)
}

/// Rotate both daemon log files under `home`. A failure on one file is
/// logged and does not block the other.
pub fn rotate_logs(home: &Path) {
    for log_path in [
        crate::paths::stdout_log_path(home),
        crate::paths::stderr_log_path(home),
    ] {
        match rotate_if_needed(&log_path, MAX_LOG_BYTES, MAX_BACKUPS) {
            Ok(true) => tracing::info!(path = %log_path.display(), "log file rotated"),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(path = %log_path.display(), error = %err, "log rotation failed")
            }
        }
    }
}

/// `daemon.log` → `daemon.log.<n>`.
fn backup_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(crate::paths::DAEMON_STDOUT_LOG);
    base.with_file_name(format!("{name}.{n}"))
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn oversized() -> Vec<u8> {
        vec![b'x'; MAX_LOG_BYTES as usize + 1]
    }

    #[test]
    fn small_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("daemon.log");
        fs::write(&log, "a few lines").unwrap();

        let rotated = rotate_if_needed(&log, MAX_LOG_BYTES, MAX_BACKUPS).unwrap();

        assert!(!rotated);
        assert!(!backup_path(&log, 1).exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("daemon.log");
        let rotated = rotate_if_needed(&log, MAX_LOG_BYTES, MAX_BACKUPS).unwrap();
        assert!(!rotated);
    }

    #[test]
    fn oversized_file_moves_to_dot_one_and_live_log_is_emptied() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("daemon.log");
        fs::write(&log, oversized()).unwrap();

        let rotated = rotate_if_needed(&log, MAX_LOG_BYTES, MAX_BACKUPS).unwrap();

        assert!(rotated);
        assert_eq!(fs::metadata(&log).unwrap().len(), 0);
        assert!(fs::metadata(backup_path(&log, 1)).unwrap().len() > 0);
    }

    #[test]
    fn backups_shift_and_the_oldest_is_dropped() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("daemon.log");
        for n in 1..=MAX_BACKUPS {
            fs::write(backup_path(&log, n), format!("backup-{n}")).unwrap();
        }
        fs::write(&log, oversized()).unwrap();

        rotate_if_needed(&log, MAX_LOG_BYTES, MAX_BACKUPS).unwrap();

        // What was backup-1 now lives in slot 2; slot 6 must never appear.
        assert_eq!(
            fs::read_to_string(backup_path(&log, 2)).unwrap(),
            "backup-1"
        );
        assert!(!backup_path(&log, MAX_BACKUPS + 1).exists());
    }

    #[test]
    fn repeated_rotations_keep_the_newest_in_slot_one() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("daemon.log");

        for round in 1..=3u8 {
            fs::write(&log, vec![b'0' + round; MAX_LOG_BYTES as usize + 1]).unwrap();
            rotate_if_needed(&log, MAX_LOG_BYTES, MAX_BACKUPS).unwrap();
        }

        let newest = fs::read(backup_path(&log, 1)).unwrap();
        assert_eq!(newest[0], b'3');
        let oldest = fs::read(backup_path(&log, 3)).unwrap();
        assert_eq!(oldest[0], b'1');
        assert!(!backup_path(&log, 4).exists());
    }
}
