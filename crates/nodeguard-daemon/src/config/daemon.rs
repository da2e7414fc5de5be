use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::constants::{DAEMON_EXECUTABLE, DEFAULT_EXIT_COMMAND, DEFAULT_RPC_HOST, DEFAULT_RPC_TIMEOUT_SECS};
use nodeguard_types::DEFAULT_DAEMON_RPC_PORT;

/// The supervised daemon: how to launch it and where its RPC listens.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub name: Option<String>,
    pub path: Option<PathBuf>,
    pub args: Vec<String>,
    pub rpc_host: String,
    pub port: u16,
    pub rpc_timeout_secs: u64,
    /// Line written to the daemon's stdin to ask it to shut down. Empty disables
    /// the cooperative step and stop goes straight to the terminate signal.
    pub exit_command: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            name: None,
            path: None,
            args: Vec::new(),
            rpc_host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_DAEMON_RPC_PORT,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            exit_command: DEFAULT_EXIT_COMMAND.to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn executable_path(&self) -> PathBuf {
        if let Some(ref path) = self.path {
            return path.clone();
        }

        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(DAEMON_EXECUTABLE)))
            .unwrap_or_else(|| PathBuf::from(DAEMON_EXECUTABLE))
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("COMPUTERNAME"))
                .unwrap_or_else(|_| "unnamed-node".to_string())
        })
    }

    pub fn rpc_base_url(&self) -> String {
        format!("http://{}:{}", self.rpc_host, self.port)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn cooperative_exit(&self) -> Option<&str> {
        let command = self.exit_command.trim();
        (!command.is_empty()).then_some(command)
    }
}
