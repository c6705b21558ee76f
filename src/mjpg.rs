//! MJPG helper supervision
//!
//! The helper (`mjpg_streamer`) reads the V4L2 capture and serves it as an
//! HTTP MJPEG stream. It runs in its own process group so the whole tree can
//! be interrupted at once. Stops are graceful-then-forced: SIGINT, a bounded
//! wait, SIGKILL on expiry — an abrupt kill can wedge the shared V4L2 and
//! network resources, while a hung helper must not block server shutdown.

use crate::constants::{WAIT_START_MJPG, WAIT_STOP_MJPG};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{error, info, warn};

/// Desired helper configuration; equality decides restart-vs-keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub capture: String,
    pub width: u16,
    pub height: u16,
    pub fps: u8,
    pub port: u16,
}

/// Supervisor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Result of an ensure request
#[derive(Debug)]
pub enum EnsureOutcome {
    /// Helper already runs with exactly this configuration
    AlreadyRunning,
    /// Helper spawned and survived the startup window
    Started,
    /// Helper exited inside the startup window
    Exited { status: i32 },
}

/// Lifecycle manager for the one helper process
pub struct MjpgSupervisor {
    /// Helper install directory; empty means resolve via PATH
    root: PathBuf,
    /// Log sink for the helper's stdout/stderr; `None` inherits ours
    log_path: Option<PathBuf>,
    child: Option<Child>,
    current: Option<StreamConfig>,
    state: State,
}

impl MjpgSupervisor {
    pub fn new(root: PathBuf, log_path: Option<PathBuf>) -> Self {
        Self {
            root,
            log_path,
            child: None,
            current: None,
            state: State::Idle,
        }
    }

    /// Lifecycle introspection (exercised by the supervision tests)
    #[allow(dead_code)]
    pub fn state(&self) -> State {
        self.state
    }

    /// Current configuration when the helper is live
    #[allow(dead_code)]
    pub fn running_config(&mut self) -> Option<&StreamConfig> {
        if self.is_running() {
            self.current.as_ref()
        } else {
            None
        }
    }

    /// Bring the helper to the requested configuration
    ///
    /// Identical configuration on a live helper is a no-op; anything else
    /// stops the old instance first, then spawns and watches the new one for
    /// the startup window.
    pub async fn ensure(&mut self, cfg: StreamConfig) -> Result<EnsureOutcome> {
        if self.is_running() {
            if self.current.as_ref() == Some(&cfg) {
                info!("MJPG-Streamer service already started");
                return Ok(EnsureOutcome::AlreadyRunning);
            }
            info!("Stopping mjpg-streamer for the change of capture/specs");
            self.stop_child().await;
        }

        self.state = State::Starting;
        self.current = Some(cfg.clone());
        let mut child = match self.spawn_helper(&cfg) {
            Ok(child) => child,
            Err(e) => {
                self.state = State::Idle;
                return Err(e);
            }
        };

        match tokio::time::timeout(WAIT_START_MJPG, child.wait()).await {
            // Survived the window: consider it up
            Err(_) => {
                info!(pid = child.id(), "MJPG-Streamer service started");
                self.child = Some(child);
                self.state = State::Running;
                Ok(EnsureOutcome::Started)
            }
            Ok(wait) => {
                let status = wait.context("waiting on the spawned helper")?;
                let code = exit_code(&status);
                error!(status = code, "MJPG-Streamer service exited unexpected");
                self.state = State::Idle;
                Ok(EnsureOutcome::Exited { status: code })
            }
        }
    }

    /// Stop the helper if it runs; used on server shutdown
    pub async fn shutdown(&mut self) {
        if self.is_running() {
            self.stop_child().await;
            info!("MJPG-Streamer service has been terminated");
        }
        self.state = State::Idle;
    }

    fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                // Exited (or unobservable): forget the handle
                _ => {
                    self.child = None;
                    false
                }
            },
            None => false,
        }
    }

    /// SIGINT to the process group, bounded wait, SIGKILL on expiry
    async fn stop_child(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        self.state = State::Stopping;
        signal_group(&child, libc::SIGINT);
        info!("Sent SIGINT to mjpg-streamer service");
        if tokio::time::timeout(WAIT_STOP_MJPG, child.wait()).await.is_err() {
            warn!("Termination of mjpg-streamer service timeout");
            signal_group(&child, libc::SIGKILL);
            warn!("Sent SIGKILL to mjpg-streamer service");
            let _ = child.wait().await;
        }
        self.state = State::Idle;
    }

    fn spawn_helper(&self, cfg: &StreamConfig) -> Result<Child> {
        let mut cmd = Command::new(helper_program(&self.root));
        cmd.arg("-i")
            .arg(format!(
                "input_uvc.so -d {} -r {}x{} -f {} -n",
                cfg.capture, cfg.width, cfg.height, cfg.fps
            ))
            .arg("-o")
            .arg(format!("output_http.so -p {} -n", cfg.port));
        if !self.root.as_os_str().is_empty() {
            cmd.env("LD_LIBRARY_PATH", &self.root);
        }
        match &self.log_path {
            Some(path) => {
                let log = std::fs::File::create(path)
                    .with_context(|| format!("opening helper log {}", path.display()))?;
                let err = log.try_clone().context("cloning helper log handle")?;
                cmd.stdout(Stdio::from(log)).stderr(Stdio::from(err));
            }
            None => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }
        cmd.process_group(0);
        cmd.spawn().context("spawning mjpg_streamer")
    }
}

fn helper_program(root: &Path) -> PathBuf {
    if root.as_os_str().is_empty() {
        PathBuf::from("mjpg_streamer")
    } else {
        root.join("mjpg_streamer")
    }
}

/// Deliver a signal to the child's whole process group
fn signal_group(child: &Child, signal: libc::c_int) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::killpg(pid as libc::pid_t, signal);
        }
    }
}

/// Exit code in the shell convention: negative for signal deaths
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| -status.signal().unwrap_or(0))
}
