use chrono::{DateTime, Utc};
use nodeguard_types::{DaemonInfo, DaemonStatus, HealthSnapshot};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::config::GuardConfig;
use crate::rpc::DaemonProbe;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HealthFailure {
    Stalled { height: u64, for_secs: u64 },
    BadStatus(DaemonStatus),
    Unreachable { failures: u32, error: String },
}

impl fmt::Display for HealthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthFailure::Stalled { height, for_secs } => write!(
                f,
                "Block height {} has not changed for {}s, restarting the daemon",
                height, for_secs
            ),
            HealthFailure::BadStatus(status) => {
                write!(f, "Daemon status is {}, restarting the daemon", status)
            }
            HealthFailure::Unreachable { failures, error } => write!(
                f,
                "Daemon RPC failed {} times in a row ({}), restarting the daemon",
                failures, error
            ),
        }
    }
}

pub type FailureCallback = Arc<dyn Fn(HealthFailure) + Send + Sync>;

#[derive(Clone, Debug)]
pub struct CommsSettings {
    pub poll_interval: Duration,
    pub max_block_time: Duration,
    pub max_poll_failures: u32,
}

impl CommsSettings {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            poll_interval: config.health.poll_interval(),
            max_block_time: config.restart.max_block(),
            max_poll_failures: config.health.max_poll_failures,
        }
    }
}

/// Per-episode bookkeeping for the poll loop. A stall is reported once and
/// re-armed by the next height change.
#[derive(Debug)]
pub(crate) struct StallTracker {
    settings: CommsSettings,
    last_height: Option<u64>,
    last_change: Instant,
    last_change_at: DateTime<Utc>,
    stall_reported: bool,
    consecutive_failures: u32,
}

impl StallTracker {
    pub(crate) fn new(settings: CommsSettings, now: Instant) -> Self {
        Self {
            settings,
            last_height: None,
            last_change: now,
            last_change_at: Utc::now(),
            stall_reported: false,
            consecutive_failures: 0,
        }
    }

    pub(crate) fn on_response(&mut self, info: &DaemonInfo, now: Instant) -> Option<HealthFailure> {
        self.consecutive_failures = 0;

        if self.last_height != Some(info.height) {
            self.last_height = Some(info.height);
            self.last_change = now;
            self.last_change_at = Utc::now();
            self.stall_reported = false;
        }

        let stalled_for = now.saturating_duration_since(self.last_change);
        if stalled_for > self.settings.max_block_time {
            if self.stall_reported {
                return None;
            }
            self.stall_reported = true;
            return Some(HealthFailure::Stalled {
                height: info.height,
                for_secs: stalled_for.as_secs(),
            });
        }

        if !info.status.is_ok() {
            return Some(HealthFailure::BadStatus(info.status.clone()));
        }

        None
    }

    pub(crate) fn on_error(&mut self, error: &str) -> Option<HealthFailure> {
        self.consecutive_failures += 1;
        if self.consecutive_failures < self.settings.max_poll_failures {
            return None;
        }

        let failures = self.consecutive_failures;
        self.consecutive_failures = 0;
        Some(HealthFailure::Unreachable {
            failures,
            error: error.to_string(),
        })
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub(crate) fn last_change_at(&self) -> DateTime<Utc> {
        self.last_change_at
    }
}

/// Periodic health polling of a running daemon.
pub struct HealthCommunicator {
    probe: Arc<dyn DaemonProbe>,
    settings: CommsSettings,
    on_failure: FailureCallback,
    snapshot: Arc<RwLock<Option<HealthSnapshot>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthCommunicator {
    pub fn new(probe: Arc<dyn DaemonProbe>, settings: CommsSettings, on_failure: FailureCallback) -> Self {
        Self {
            probe,
            settings,
            on_failure,
            snapshot: Arc::new(RwLock::new(None)),
            task: Mutex::new(None),
        }
    }

    /// Starts polling; the first poll runs immediately. Restarting an active
    /// communicator replaces its loop and resets stall tracking.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if let Some(handle) = task.take() {
            handle.abort();
        }

        let probe = self.probe.clone();
        let settings = self.settings.clone();
        let on_failure = self.on_failure.clone();
        let snapshot = self.snapshot.clone();

        *task = Some(tokio::spawn(async move {
            poll_loop(probe, settings, on_failure, snapshot).await;
        }));
    }

    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            debug!("Health communicator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> Option<HealthSnapshot> {
        self.snapshot.read().clone()
    }
}

impl Drop for HealthCommunicator {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn poll_loop(
    probe: Arc<dyn DaemonProbe>,
    settings: CommsSettings,
    on_failure: FailureCallback,
    snapshot: Arc<RwLock<Option<HealthSnapshot>>>,
) {
    let mut ticker = tokio::time::interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tracker = StallTracker::new(settings, Instant::now());

    loop {
        ticker.tick().await;

        let failure = match probe.info().await {
            Ok(info) => {
                trace!("Daemon height {} status {}", info.height, info.status);
                let failure = tracker.on_response(&info, Instant::now());
                *snapshot.write() = Some(HealthSnapshot {
                    info,
                    last_height_change: tracker.last_change_at(),
                    consecutive_timeouts: 0,
                });
                failure
            }
            Err(e) => {
                debug!("Health poll failed: {}", e);
                let failure = tracker.on_error(&e.to_string());
                if let Some(ref mut snap) = *snapshot.write() {
                    snap.consecutive_timeouts = tracker.consecutive_failures();
                }
                failure
            }
        };

        if let Some(failure) = failure {
            warn!("Daemon health check failed: {}", failure);
            on_failure(failure);
        }
    }
}
