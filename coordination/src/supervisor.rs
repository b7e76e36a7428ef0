//! Process Supervisor: owns at most one backend-under-test process.
//!
//! `start` always tears down the previous process first, so a supervisor
//! holds a single child at any time. On Unix each backend runs in its own
//! process group and `stop` kills the whole group, so helper processes such
//! as a dev-server reloader go down with it. `start` refuses to launch while
//! anything still listens on the backend port.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CoordinationError;

/// Bytes of stderr kept for boot failure reports.
pub const STDERR_EXCERPT_BYTES: usize = 2048;

/// Entry files probed in order, with the runtime that launches them.
const ENTRY_POINTS: [(&str, Runtime); 4] = [
    ("app.py", Runtime::Python),
    ("main.py", Runtime::Python),
    ("server.js", Runtime::Node),
    ("index.js", Runtime::Node),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Runtime {
    Python,
    Node,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub python: String,
    pub node: String,
    pub host: String,
    pub port: u16,
    /// How long a fresh process must survive to count as booted.
    pub readiness_window: Duration,
    pub poll_interval: Duration,
    /// Bound on waiting for a killed child to be reaped.
    pub stop_timeout: Duration,
    /// Program and arguments replacing the inferred launch command.
    pub command_override: Option<Vec<String>>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            node: "node".to_string(),
            host: "localhost".to_string(),
            port: 5000,
            readiness_window: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(5),
            command_override: None,
        }
    }
}

/// Why the backend did not come up.
#[derive(Debug, Error)]
pub enum BootFailure {
    #[error("backend exited during startup ({status}): {stderr}")]
    Exited { status: String, stderr: String },

    #[error("port {addr} is already in use by another process")]
    PortInUse { addr: String },

    #[error("backend could not be launched: {0}")]
    Launch(#[from] CoordinationError),
}

impl BootFailure {
    /// Diagnostic text handed to the repair loop.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Exited { status, stderr } if stderr.trim().is_empty() => {
                format!("BOOT_FAIL: server exited during startup ({status})")
            }
            Self::Exited { status, stderr } => {
                format!("BOOT_FAIL: server exited during startup ({status})\n{stderr}")
            }
            Self::PortInUse { addr } => {
                format!("BOOT_FAIL: port {addr} already in use by another process")
            }
            Self::Launch(e) => format!("BOOT_FAIL: {e}"),
        }
    }
}

struct Running {
    child: Child,
    /// Process group id; equals the child's pid at spawn.
    pgid: Option<u32>,
    command: String,
    stderr_tail: Arc<Mutex<Vec<u8>>>,
    drain: Option<JoinHandle<()>>,
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    running: Option<Running>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Whether a child is currently held and has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.running.as_mut() {
            Some(r) => matches!(r.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn launch_command(&self, backend_dir: &Path) -> Result<(String, Vec<String>), BootFailure> {
        if let Some(cmd) = &self.config.command_override {
            if let Some((program, args)) = cmd.split_first() {
                return Ok((program.clone(), args.to_vec()));
            }
        }
        for (file, runtime) in ENTRY_POINTS {
            if backend_dir.join(file).is_file() {
                let program = match runtime {
                    Runtime::Python => self.config.python.clone(),
                    Runtime::Node => self.config.node.clone(),
                };
                return Ok((program, vec![file.to_string()]));
            }
        }
        Err(CoordinationError::NoEntryPoint(backend_dir.to_path_buf()).into())
    }

    /// Launch the backend in `backend_dir` and wait out the readiness window.
    pub async fn start(&mut self, backend_dir: &Path) -> Result<(), BootFailure> {
        self.stop().await;

        if !backend_dir.is_dir() {
            return Err(CoordinationError::BackendDirMissing(backend_dir.to_path_buf()).into());
        }
        let (program, args) = self.launch_command(backend_dir)?;
        let command = format!("{} {}", program, args.join(" "));
        self.ensure_port_free().await?;

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .current_dir(backend_dir)
            .env("PORT", self.config.port.to_string())
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| CoordinationError::Spawn {
            command: command.clone(),
            source,
        })?;
        let pgid = child.id();

        let stderr_tail = Arc::new(Mutex::new(Vec::new()));
        let drain = child.stderr.take().map(|mut stderr| {
            let tail = Arc::clone(&stderr_tail);
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                while let Ok(n) = stderr.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                    if let Ok(mut t) = tail.lock() {
                        t.extend_from_slice(&buf[..n]);
                        let excess = t.len().saturating_sub(STDERR_EXCERPT_BYTES);
                        t.drain(..excess);
                    }
                }
            })
        });

        info!(command = %command, dir = %backend_dir.display(), pid = ?child.id(), "backend started");
        self.running = Some(Running {
            child,
            pgid,
            command,
            stderr_tail,
            drain,
        });

        self.await_readiness().await
    }

    async fn await_readiness(&mut self) -> Result<(), BootFailure> {
        let deadline = Instant::now() + self.config.readiness_window;
        let addr = self.addr();

        loop {
            let Some(running) = self.running.as_mut() else {
                return Ok(());
            };
            match running.child.try_wait() {
                Ok(Some(status)) => {
                    let mut running = match self.running.take() {
                        Some(r) => r,
                        None => return Ok(()),
                    };
                    if let Some(pgid) = running.pgid {
                        kill_group(pgid);
                    }
                    if let Some(drain) = running.drain.take() {
                        let _ = tokio::time::timeout(Duration::from_millis(500), drain).await;
                    }
                    let stderr = excerpt(&running.stderr_tail);
                    warn!(command = %running.command, %status, "backend exited during readiness window");
                    return Err(BootFailure::Exited {
                        status: status.to_string(),
                        stderr,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "could not poll backend status"),
            }

            if Instant::now() >= deadline {
                debug!("readiness window elapsed with backend alive");
                return Ok(());
            }

            if accepting(&addr, self.config.poll_interval).await {
                debug!(%addr, "backend accepting connections");
                return Ok(());
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Wait up to `stop_timeout` for the backend port to stop accepting.
    async fn port_released(&self) -> bool {
        let addr = self.addr();
        let deadline = Instant::now() + self.config.stop_timeout;
        loop {
            if !accepting(&addr, self.config.poll_interval).await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn ensure_port_free(&self) -> Result<(), BootFailure> {
        if self.port_released().await {
            return Ok(());
        }
        let addr = self.addr();
        warn!(%addr, "backend port still in use");
        Err(BootFailure::PortInUse { addr })
    }

    /// Kill the held process group, if any. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        if let Some(pgid) = running.pgid {
            kill_group(pgid);
        }
        if let Err(e) = running.child.start_kill() {
            debug!(error = %e, "backend already gone");
        }
        match tokio::time::timeout(self.config.stop_timeout, running.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "backend stopped"),
            Ok(Err(e)) => warn!(error = %e, "failed to reap backend"),
            Err(_) => warn!(command = %running.command, "backend did not exit within stop timeout"),
        }
        if let Some(drain) = running.drain.take() {
            drain.abort();
        }
        if !self.port_released().await {
            warn!(addr = %self.addr(), "backend port still accepting after stop");
        }
    }

    /// `<workspace>/backend`
    pub fn backend_dir(workspace: &Path) -> PathBuf {
        workspace.join("backend")
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if let Some(pgid) = self.running.as_ref().and_then(|r| r.pgid) {
            kill_group(pgid);
        }
    }
}

async fn accepting(addr: &str, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; a stale group id fails with ESRCH.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

fn excerpt(tail: &Arc<Mutex<Vec<u8>>>) -> String {
    let bytes = tail.lock().map(|t| t.clone()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).trim().to_string()
}
