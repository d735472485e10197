//! JSONL control protocol over the daemon's Unix socket.
//!
//! One request per line, one response per line. Commands: `status`,
//! `check` (optionally scoped to a repository), `stop`.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Send one request and read one response over a fresh connection.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let mut payload = serde_json::to_string(request)?;
    payload.push('\n');
    stream
        .write_all(payload.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|e| io_err(&socket, e))?;

    let mut line = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    Ok(serde_json::from_str(line.trim_end())?)
}

fn request(home: &Path, cmd: &str, repo: Option<String>) -> Result<Value, DaemonError> {
    let response = send_request(
        home,
        &DaemonRequest {
            cmd: cmd.to_string(),
            repo,
        },
    )?;
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Protocol(response.error.unwrap_or_else(|| {
            "unknown daemon error".to_string()
        })))
    }
}

/// Query runtime status, retrying briefly while the daemon is starting up.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let mut last_err = None;
    for attempt in 0..5 {
        match request(home, "status", None) {
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_err = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                }
            }
            other => return other,
        }
    }
    Err(last_err.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

/// Request graceful shutdown.
pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    request(home, "stop", None).map(|_| ())
}

/// Trigger an immediate sweep, optionally scoped to one repository.
pub fn request_check(home: &Path, repo: Option<String>) -> Result<Value, DaemonError> {
    request(home, "check", repo)
}
