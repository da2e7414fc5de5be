use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::*;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    pub max_close_errors: u32,
    pub error_forget_time: u64,
    pub max_init_time: u64,
    pub max_block_time: u64,
    pub terminate_timeout: u64,
    pub cooperative_timeout: u64,
    pub fatal_exit_delay: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_close_errors: DEFAULT_MAX_CLOSE_ERRORS,
            error_forget_time: DEFAULT_ERROR_FORGET_SECS,
            max_init_time: DEFAULT_MAX_INIT_SECS,
            max_block_time: DEFAULT_MAX_BLOCK_SECS,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT_SECS,
            cooperative_timeout: DEFAULT_COOPERATIVE_TIMEOUT_SECS,
            fatal_exit_delay: DEFAULT_FATAL_EXIT_DELAY_SECS,
        }
    }
}

impl RestartConfig {
    pub fn error_forget(&self) -> Duration {
        Duration::from_secs(self.error_forget_time)
    }

    pub fn max_init(&self) -> Duration {
        Duration::from_secs(self.max_init_time)
    }

    pub fn max_block(&self) -> Duration {
        Duration::from_secs(self.max_block_time)
    }

    /// Window between the terminate signal and the forced kill, never below
    /// `MIN_TERMINATE_TIMEOUT_SECS`.
    pub fn terminate_window(&self) -> Duration {
        Duration::from_secs(self.terminate_timeout.max(MIN_TERMINATE_TIMEOUT_SECS))
    }

    pub fn cooperative_window(&self) -> Duration {
        Duration::from_secs(self.cooperative_timeout)
    }

    pub fn fatal_delay(&self) -> Duration {
        Duration::from_secs(self.fatal_exit_delay)
    }
}
