use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::{DEFAULT_HEALTH_POLL_SECS, DEFAULT_INIT_POLL_SECS, DEFAULT_MAX_POLL_FAILURES};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub init_poll_secs: u64,
    pub poll_interval_secs: u64,
    pub max_poll_failures: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            init_poll_secs: DEFAULT_INIT_POLL_SECS,
            poll_interval_secs: DEFAULT_HEALTH_POLL_SECS,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

impl HealthConfig {
    pub fn init_poll(&self) -> Duration {
        Duration::from_secs(self.init_poll_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
