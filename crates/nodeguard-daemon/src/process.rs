use async_trait::async_trait;
use nodeguard_types::{GuardError, GuardResult};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitOutcome {
    pub fn code(code: i32) -> Self {
        Self { code: Some(code), signal: None }
    }

    pub fn signalled(signal: i32) -> Self {
        Self { code: None, signal: Some(signal) }
    }

    pub fn unknown() -> Self {
        Self { code: None, signal: None }
    }

    pub fn was_signalled(&self) -> bool {
        self.signal.is_some()
    }

    fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self { code: status.code(), signal }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (_, Some(signal)) => write!(f, "signal {}", signal),
            (Some(code), None) => write!(f, "code {}", code),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Pipe stdin so a cooperative exit command can be written to the child.
    pub stdin_control: bool,
}

/// A spawned daemon. Signals are delivered through `&self` so the exit watcher
/// and the stop escalation can hold the same handle.
#[async_trait]
pub trait DaemonChild: Send + Sync {
    fn pid(&self) -> Option<u32>;

    /// Writes `command` to the child's stdin. `Ok(false)` means the child has
    /// no input channel and the cooperative step must be skipped.
    async fn request_exit(&self, command: &str) -> GuardResult<bool>;

    fn terminate(&self) -> GuardResult<()>;

    fn kill(&self) -> GuardResult<()>;

    async fn wait(&self) -> ExitOutcome;
}

pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> GuardResult<Arc<dyn DaemonChild>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OsLauncher;

impl ProcessLauncher for OsLauncher {
    fn launch(&self, spec: &LaunchSpec) -> GuardResult<Arc<dyn DaemonChild>> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(if spec.stdin_control { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            GuardError::Process(format!("Failed to spawn {}: {}", spec.program.display(), e))
        })?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Some(()) = kill_rx.recv() => {
                    if let Err(e) = child.start_kill() {
                        debug!("Kill request after exit: {}", e);
                    }
                    child.wait().await
                }
            };

            let outcome = match status {
                Ok(status) => ExitOutcome::from_status(status),
                Err(e) => {
                    warn!("Failed to collect daemon exit status: {}", e);
                    ExitOutcome::unknown()
                }
            };
            let _ = exit_tx.send(Some(outcome));
        });

        Ok(Arc::new(OsChild {
            pid,
            stdin: tokio::sync::Mutex::new(stdin),
            kill_tx,
            exit: exit_rx,
        }))
    }
}

struct OsChild {
    pid: Option<u32>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    kill_tx: mpsc::UnboundedSender<()>,
    exit: watch::Receiver<Option<ExitOutcome>>,
}

impl OsChild {
    fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }
}

#[async_trait]
impl DaemonChild for OsChild {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn request_exit(&self, command: &str) -> GuardResult<bool> {
        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            return Ok(false);
        };

        let line = format!("{}\n", command);
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| GuardError::Process(format!("Failed to write exit command: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| GuardError::Process(format!("Failed to flush exit command: {}", e)))?;

        Ok(true)
    }

    fn terminate(&self) -> GuardResult<()> {
        if self.has_exited() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = self
                .pid
                .ok_or_else(|| GuardError::Process("Daemon has no PID".into()))?;
            kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
                .map_err(|e| GuardError::Process(format!("Failed to send SIGTERM: {}", e)))
        }

        #[cfg(not(unix))]
        {
            self.kill()
        }
    }

    fn kill(&self) -> GuardResult<()> {
        if self.has_exited() {
            return Ok(());
        }

        self.kill_tx
            .send(())
            .map_err(|_| GuardError::Process("Daemon reaper is gone".into()))
    }

    async fn wait(&self) -> ExitOutcome {
        let mut rx = self.exit.clone();
        loop {
            if let Some(outcome) = *rx.borrow() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().unwrap_or_else(ExitOutcome::unknown);
            }
        }
    }
}
