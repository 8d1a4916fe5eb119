//! Transcoder process supervisor.
//!
//! Owns the single external encoder process. The process writes its output back
//! into the relay over HTTP, so the supervisor only has to start it, stop it and
//! report on it. There is no automatic restart.

use parking_lot::Mutex;
use serde::Serialize;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::TranscoderConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyStarted,
}

impl StartOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            StartOutcome::Started => "started",
            StartOutcome::AlreadyStarted => "already started",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

impl StopOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            StopOutcome::Stopped => "stopped",
            StopOutcome::AlreadyStopped => "already stopped",
        }
    }
}

/// Snapshot of the supervisor state.
#[derive(Debug, Clone, Serialize)]
pub struct TranscoderStatus {
    /// A handle is held (start was called and stop was not).
    pub started: bool,
    pub pid: Option<u32>,
    pub first_output_seen: bool,
    /// The process exited on its own.
    pub exited: bool,
    /// Exit code, if the process exited with one.
    pub exit_code: Option<i32>,
    /// Processes spawned since the supervisor was created.
    pub spawn_count: u64,
}

/// Handle to the running transcoder process.
struct TranscoderHandle {
    pid: Option<u32>,
    first_output_seen: Arc<AtomicBool>,
    exit: Arc<OnceLock<Option<i32>>>,
    stop_tx: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<()>,
}

pub struct TranscoderSupervisor {
    config: TranscoderConfig,
    handle: Mutex<Option<TranscoderHandle>>,
    spawn_count: AtomicU64,
}

impl TranscoderSupervisor {
    pub fn new(config: TranscoderConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
            spawn_count: AtomicU64::new(0),
        }
    }

    /// Start the transcoder unless one is already held.
    ///
    /// Spawn failures are logged and still reported as [`StartOutcome::Started`]:
    /// the transition was attempted, and no handle is kept.
    pub fn start(&self) -> StartOutcome {
        let mut guard = self.handle.lock();
        if guard.is_some() {
            debug!("Transcoder already started");
            return StartOutcome::AlreadyStarted;
        }

        match self.spawn() {
            Ok(handle) => {
                info!(
                    program = %self.config.program,
                    pid = ?handle.pid,
                    "Spawned transcoder"
                );
                *guard = Some(handle);
            }
            Err(e) => {
                error!(error = %e, "Failed to start transcoder");
            }
        }
        StartOutcome::Started
    }

    /// Stop the transcoder if one is held.
    pub fn stop(&self) -> StopOutcome {
        match self.take_handle() {
            Some(handle) => {
                info!(pid = ?handle.pid, "Stopping transcoder");
                StopOutcome::Stopped
            }
            None => {
                debug!("Transcoder already stopped");
                StopOutcome::AlreadyStopped
            }
        }
    }

    /// Stop the transcoder and wait for the process to be reaped.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.take_handle() {
            info!(pid = ?handle.pid, "Shutting down transcoder");
            if let Err(e) = handle.monitor.await {
                warn!(error = %e, "Transcoder monitor task failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    pub fn spawn_count(&self) -> u64 {
        self.spawn_count.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> TranscoderStatus {
        let guard = self.handle.lock();
        let exit = guard.as_ref().and_then(|h| h.exit.get().copied());
        TranscoderStatus {
            started: guard.is_some(),
            pid: guard.as_ref().and_then(|h| h.pid),
            first_output_seen: guard
                .as_ref()
                .map(|h| h.first_output_seen.load(Ordering::Relaxed))
                .unwrap_or(false),
            exited: exit.is_some(),
            exit_code: exit.flatten(),
            spawn_count: self.spawn_count(),
        }
    }

    /// Clear the handle and signal its monitor to kill the process.
    fn take_handle(&self) -> Option<TranscoderHandle> {
        let mut handle = self.handle.lock().take()?;
        if let Some(stop_tx) = handle.stop_tx.take() {
            // The monitor is gone if the process already exited.
            let _ = stop_tx.send(());
        }
        Some(handle)
    }

    fn spawn(&self) -> Result<TranscoderHandle> {
        debug!(
            program = %self.config.program,
            args = ?self.config.args,
            "Spawning transcoder"
        );

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        self.spawn_count.fetch_add(1, Ordering::Relaxed);

        let pid = child.id();
        let first_output_seen = Arc::new(AtomicBool::new(false));
        let exit = Arc::new(OnceLock::new());
        let (stop_tx, stop_rx) = oneshot::channel();

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(watch_stderr(stderr, pid, Arc::clone(&first_output_seen)));
        }
        let monitor = tokio::spawn(monitor_process(child, pid, Arc::clone(&exit), stop_rx));

        Ok(TranscoderHandle {
            pid,
            first_output_seen,
            exit,
            stop_tx: Some(stop_tx),
            monitor,
        })
    }
}

/// Drain the process diagnostics, logging readiness on the first output.
async fn watch_stderr(
    mut stderr: ChildStderr,
    pid: Option<u32>,
    first_output_seen: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if !first_output_seen.swap(true, Ordering::Relaxed) {
                    info!(pid = ?pid, "Transcoder started");
                }
                let output = String::from_utf8_lossy(&buf[..n]);
                trace!(pid = ?pid, output = %output.trim_end(), "Transcoder output");
            }
            Err(e) => {
                debug!(pid = ?pid, error = %e, "Transcoder stderr closed");
                break;
            }
        }
    }
}

/// Wait for the process to exit or for a stop request, whichever comes first.
async fn monitor_process(
    mut child: Child,
    pid: Option<u32>,
    exit: Arc<OnceLock<Option<i32>>>,
    stop_rx: oneshot::Receiver<()>,
) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                let _ = exit.set(status.code());
                warn!(pid = ?pid, status = %status, "Transcoder exited unexpectedly");
            }
            Err(e) => {
                let _ = exit.set(None);
                error!(pid = ?pid, error = %e, "Failed to wait on transcoder");
            }
        },
        _ = stop_rx => {
            if let Err(e) = child.kill().await {
                warn!(pid = ?pid, error = %e, "Failed to kill transcoder");
            }
            info!(pid = ?pid, "Transcoder closed");
        }
    }
}
