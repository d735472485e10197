//! Daemon runtime: poll loop + sweep processor + socket server.
//!
//! One sweep runs at a time: interval ticks and socket `check` requests both
//! funnel into the same mpsc-fed processor, so sweeps never overlap and
//! repositories are always handled serially in config order.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::Instant;

use pullwatch_core::config;
use pullwatch_core::types::CycleOutcome;
use pullwatch_exec::SystemRunner;
use pullwatch_sync::{pipeline, RepoReport, Scope};

use crate::error::{io_err, DaemonError};
use crate::paths::{logs_dir, run_dir, socket_path, ROTATION_CHECK_INTERVAL};
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Last observed status per repository (display name → status).
/// Reporting only — nothing here feeds back into later cycles.
pub type OutcomeCache = HashMap<String, RepoStatus>;

#[derive(Debug, Clone, Serialize)]
pub struct RepoStatus {
    pub outcome: CycleOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub checked_at_unix: u64,
    pub duration_ms: u128,
}

#[derive(Debug, Clone)]
enum SweepTarget {
    All,
    Repo(String),
}

impl SweepTarget {
    fn scope(&self) -> Scope {
        match self {
            SweepTarget::All => Scope::All,
            SweepTarget::Repo(name) => Scope::Repo(name.clone()),
        }
    }

    fn label(&self) -> String {
        match self {
            SweepTarget::All => "all".to_string(),
            SweepTarget::Repo(name) => name.clone(),
        }
    }
}

struct SweepJob {
    target: SweepTarget,
    source: &'static str,
    respond_to: oneshot::Sender<Result<SweepSummary, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub target: String,
    pub source: String,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub duration_ms: u128,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, config_path: PathBuf) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config_path))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf, config_path: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    // Config load failure at startup is the one fatal error class.
    let startup = config::load_at(&config_path)?;
    let check_interval = Duration::from_secs(startup.check_interval);
    tracing::info!(
        config = %config_path.display(),
        repositories = startup.repositories.len(),
        check_interval_secs = startup.check_interval,
        "starting pullwatch daemon"
    );

    let outcomes: Arc<RwLock<OutcomeCache>> = Arc::new(RwLock::new(HashMap::new()));
    let started_at_unix = unix_seconds_now();

    let (sweep_tx, sweep_rx) = mpsc::channel::<SweepJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let poll_handle = {
        let shutdown = shutdown_tx.clone();
        let sweep_tx = sweep_tx.clone();
        tokio::spawn(async move {
            let result = poll_task(check_interval, sweep_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let config_path = config_path.clone();
        let outcomes = outcomes.clone();
        tokio::spawn(async move {
            let result =
                sweep_processor_task(config_path, outcomes, sweep_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let config_path = config_path.clone();
        let outcomes = outcomes.clone();
        let sweep_tx = sweep_tx.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                config_path,
                outcomes,
                sweep_tx,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at_unix,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(home, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (poll_result, processor_result, socket_result, rotation_result, signal_result) = tokio::join!(
        poll_handle,
        processor_handle,
        socket_handle,
        rotation_handle,
        signal_handle
    );

    handle_join("poll", poll_result)?;
    handle_join("sweep_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Enqueue a full sweep on every tick. The first tick fires immediately, so
/// the daemon checks all repositories right after startup.
async fn poll_task(
    check_interval: Duration,
    sweep_tx: mpsc::Sender<SweepJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                match enqueue_sweep(&sweep_tx, SweepTarget::All, "interval").await {
                    Ok(summary) => {
                        tracing::info!(
                            updated = summary.updated,
                            unchanged = summary.unchanged,
                            failed = summary.failed,
                            duration_ms = summary.duration_ms,
                            "poll sweep completed",
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "poll sweep failed");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn sweep_processor_task(
    config_path: PathBuf,
    outcomes: Arc<RwLock<OutcomeCache>>,
    mut sweep_rx: mpsc::Receiver<SweepJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sweep_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();

                let target = job.target.clone();
                let source = job.source;
                let config_path = config_path.clone();
                // Re-read config every sweep so repository edits land
                // without a daemon restart.
                let sweep_result = tokio::task::spawn_blocking(move || -> Result<Vec<RepoReport>, String> {
                    let cfg = config::load_at(&config_path).map_err(|e| e.to_string())?;
                    pipeline::run(&cfg, target.scope(), &SystemRunner).map_err(|e| e.to_string())
                })
                .await
                .map_err(|err| DaemonError::Protocol(format!("sweep task join error: {err}")))?;

                let outcome = match sweep_result {
                    Ok(reports) => {
                        record_outcomes(&outcomes, &reports).await;
                        Ok(build_sweep_summary(job.target, source, &reports, started.elapsed()))
                    }
                    Err(err) => Err(err),
                };

                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn record_outcomes(outcomes: &Arc<RwLock<OutcomeCache>>, reports: &[RepoReport]) {
    let now = unix_seconds_now();
    let mut cache = outcomes.write().await;
    for report in reports {
        cache.insert(
            report.repo.0.clone(),
            RepoStatus {
                outcome: report.outcome,
                detail: report.detail.clone(),
                checked_at_unix: now,
                duration_ms: report.duration_ms,
            },
        );
    }
}

async fn socket_server_task(
    home: PathBuf,
    config_path: PathBuf,
    outcomes: Arc<RwLock<OutcomeCache>>,
    sweep_tx: mpsc::Sender<SweepJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let run = run_dir(&home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }

    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let config_path = config_path.clone();
                let outcomes = outcomes.clone();
                let sweep_tx = sweep_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        config_path,
                        outcomes,
                        sweep_tx,
                        shutdown_tx,
                        started_at_unix,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    config_path: PathBuf,
    outcomes: Arc<RwLock<OutcomeCache>>,
    sweep_tx: mpsc::Sender<SweepJob>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Result<DaemonRequest, _> = serde_json::from_str(&line);
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let cmd = request.cmd.clone();
        let repo = request.repo.clone();

        let response = match cmd.as_str() {
            "status" => {
                let payload =
                    build_status_payload(&config_path, outcomes.clone(), started_at_unix).await;
                DaemonResponse::ok(payload)
            }
            "check" => {
                let target = match repo {
                    Some(repo) => SweepTarget::Repo(repo),
                    None => SweepTarget::All,
                };
                match enqueue_sweep(&sweep_tx, target, "socket").await {
                    Ok(summary) => DaemonResponse::ok(json!(summary)),
                    Err(err) => DaemonResponse::error(err.to_string()),
                }
            }
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn build_status_payload(
    config_path: &Path,
    outcomes: Arc<RwLock<OutcomeCache>>,
    started_at_unix: u64,
) -> Value {
    // Snapshot the cache (read lock, dropped before JSON assembly).
    let snapshot: OutcomeCache = {
        let cache = outcomes.read().await;
        cache.clone()
    };

    let mut names: Vec<&String> = snapshot.keys().collect();
    names.sort();

    let repos: Vec<Value> = names
        .iter()
        .map(|name| {
            let status = &snapshot[*name];
            json!({
                "name": name,
                "outcome": status.outcome,
                "detail": status.detail,
                "checked_at_unix": status.checked_at_unix,
                "duration_ms": status.duration_ms,
            })
        })
        .collect();

    // Daemon-wide last check = max of per-repo timestamps (0 if none yet).
    let last_check_at_unix = snapshot
        .values()
        .map(|s| s.checked_at_unix)
        .max()
        .unwrap_or(0);

    json!({
        "running": true,
        "started_at_unix": started_at_unix,
        "last_check_at_unix": last_check_at_unix,
        "repositories": repos,
        "config": config_path.display().to_string(),
    })
}

async fn enqueue_sweep(
    sweep_tx: &mpsc::Sender<SweepJob>,
    target: SweepTarget,
    source: &'static str,
) -> Result<SweepSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sweep_tx
        .send(SweepJob {
            target,
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sweep queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sweep response"))?;
    outcome.map_err(DaemonError::Protocol)
}

async fn log_rotation_task(
    home: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(ROTATION_CHECK_INTERVAL);
    // Skip the first (immediate) tick to avoid rotating on startup.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the first immediate tick

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let home = home.clone();
                tokio::task::spawn_blocking(move || {
                    crate::log_rotation::rotate_logs(&home);
                })
                .await
                .ok(); // rotation errors are logged inside rotate_logs; never crash the daemon
            }
        }
    }
    Ok(())
}

fn build_sweep_summary(
    target: SweepTarget,
    source: &'static str,
    reports: &[RepoReport],
    duration: Duration,
) -> SweepSummary {
    let mut updated = 0usize;
    let mut unchanged = 0usize;
    let mut failed = 0usize;

    for report in reports {
        match report.outcome {
            CycleOutcome::Updated => updated += 1,
            CycleOutcome::Unchanged => unchanged += 1,
            CycleOutcome::UpdatedBuildFailed | CycleOutcome::SyncFailed => failed += 1,
        }
    }

    SweepSummary {
        target: target.label(),
        source: source.to_string(),
        updated,
        unchanged,
        failed,
        duration_ms: duration.as_millis(),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = crate::paths::pullwatch_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    let logs = logs_dir(home);
    if !logs.exists() {
        fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;
    }
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
