use async_trait::async_trait;
use chrono::Local;
use nodeguard_types::{GuardResult, NodeInfo, Severity};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outbound alert sink. Delivery happens off the supervisor's path and its
/// failures are only logged.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, severity: Severity, node: &NodeInfo) -> GuardResult<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, message: &str, _severity: Severity, _node: &NodeInfo) -> GuardResult<()> {
        debug!("No notifier attached, dropping: {}", message);
        Ok(())
    }
}

/// Append-only `timestamp\tseverity\tmessage` file.
#[derive(Clone, Debug)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, severity: Severity, message: &str) -> GuardResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = format!(
            "{}\t{}\t{}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            severity,
            message.replace('\n', " ")
        );
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct EventReporter {
    log: Option<EventLog>,
    notifier: Arc<dyn Notifier>,
    notify_on_error: bool,
}

impl EventReporter {
    pub fn new(log: Option<EventLog>, notifier: Arc<dyn Notifier>, notify_on_error: bool) -> Self {
        Self {
            log,
            notifier,
            notify_on_error,
        }
    }

    pub fn silent() -> Self {
        Self::new(None, Arc::new(NullNotifier), false)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notify_on_error
    }

    /// Logs the event, appends it to the event log and, when `node` is given
    /// and notifications are on, hands it to the notifier in the background.
    pub fn report(&self, severity: Severity, message: &str, node: Option<NodeInfo>) {
        match severity {
            Severity::Info => info!("{}", message),
            Severity::Error => error!("{}", message),
        }

        if let Some(ref log) = self.log {
            if let Err(e) = log.append(severity, message) {
                warn!("Failed to write event log {:?}: {}", log.path(), e);
            }
        }

        let Some(node) = node.filter(|_| self.notify_on_error) else {
            return;
        };

        let notifier = self.notifier.clone();
        let message = message.to_string();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&message, severity, &node).await {
                warn!("Failed to deliver notification: {}", e);
            }
        });
    }
}
