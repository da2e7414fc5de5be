#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod events;
pub mod geo;
pub mod health;
pub mod identity;
pub mod pool;
pub mod process;
pub mod rpc;
pub mod supervisor;
pub mod update;

#[cfg(test)]
mod testing;

pub use config::GuardConfig;
pub use events::{EventLog, EventReporter, Notifier, NullNotifier};
pub use health::{HealthCommunicator, HealthFailure};
pub use process::{DaemonChild, ExitOutcome, OsLauncher, ProcessLauncher};
pub use rpc::{DaemonProbe, RpcProbe};
pub use supervisor::{LifecyclePhase, ShutdownReason, StopOutcome, Supervisor, SupervisorDeps};
pub use update::{UpdateOrchestrator, UpdateOutcome};
