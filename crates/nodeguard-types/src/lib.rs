#![forbid(unsafe_code)]
#![warn(clippy::all)]

mod daemon;
mod error;
mod node;

pub use daemon::{DaemonInfo, DaemonStatus, HealthSnapshot};
pub use error::{GuardError, GuardResult};
pub use node::{LocationData, NodeInfo, NodeLocation, NodeStatusSummary, Severity};

pub const DEFAULT_DAEMON_RPC_PORT: u16 = 16000;

pub const DAEMON_READY_STATUS: &str = "OK";
