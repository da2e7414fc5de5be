use std::fmt;
use std::path::PathBuf;

use crate::process::ExitOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum LifecyclePhase {
    Stopped,
    Starting,
    Initializing,
    Running,
    Stopping,
}

impl LifecyclePhase {
    pub fn can_transition_to(self, next: LifecyclePhase) -> bool {
        use LifecyclePhase::*;

        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Initializing)
                | (Starting, Stopped)
                | (Initializing, Running)
                | (Initializing, Stopping)
                | (Initializing, Stopped)
                | (Running, Stopping)
                | (Running, Stopped)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Stopped => "Stopped",
            LifecyclePhase::Starting => "Starting",
            LifecyclePhase::Initializing => "Initializing",
            LifecyclePhase::Running => "Running",
            LifecyclePhase::Stopping => "Stopping",
        };
        f.write_str(name)
    }
}

/// Why the guardian process should end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    ErrorBudgetExhausted,
    SpawnFailed(String),
    /// A new guardian binary is in place and should replace this process.
    Relaunch(PathBuf),
    Requested,
}

impl ShutdownReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::ErrorBudgetExhausted | ShutdownReason::SpawnFailed(_) => 1,
            ShutdownReason::Relaunch(_) | ShutdownReason::Requested => 0,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::ErrorBudgetExhausted => write!(f, "too many daemon failures"),
            ShutdownReason::SpawnFailed(e) => write!(f, "daemon could not be started: {}", e),
            ShutdownReason::Relaunch(path) => write!(f, "relaunching {}", path.display()),
            ShutdownReason::Requested => write!(f, "shutdown requested"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// Escalation scheduled for the live child.
    Escalating,
    AlreadyStopping,
    NoChild,
    /// The caller belonged to a daemon generation that has since been replaced.
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitRecord {
    pub generation: u64,
    pub outcome: ExitOutcome,
    pub solicited: bool,
}
