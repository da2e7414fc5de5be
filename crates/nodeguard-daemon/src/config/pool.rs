use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::DEFAULT_POOL_INTERVAL_SECS;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub notify_url: Option<String>,
    pub interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            notify_url: None,
            interval_secs: DEFAULT_POOL_INTERVAL_SECS,
        }
    }
}

impl PoolConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn enabled_url(&self) -> Option<&str> {
        self.notify_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}
