use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::constants::{
    DEFAULT_DAEMON_REPO, DEFAULT_GUARDIAN_REPO, DEFAULT_RELEASES_API, DEFAULT_UPDATE_INTERVAL_SECS,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub daemon: bool,
    pub guardian: bool,
    pub check_interval_secs: u64,
    pub api_url: String,
    pub daemon_repo: String,
    pub guardian_repo: String,
    /// External program that downloads and unpacks a release. It receives the
    /// repository and the target path as its last two arguments.
    pub fetch_command: Option<PathBuf>,
    pub fetch_args: Vec<String>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            daemon: false,
            guardian: false,
            check_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            api_url: DEFAULT_RELEASES_API.to_string(),
            daemon_repo: DEFAULT_DAEMON_REPO.to_string(),
            guardian_repo: DEFAULT_GUARDIAN_REPO.to_string(),
            fetch_command: None,
            fetch_args: Vec::new(),
        }
    }
}

impl UpdateConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn any_enabled(&self) -> bool {
        self.daemon || self.guardian
    }
}
