use chrono::{DateTime, Utc};

use super::types::{ExitRecord, LifecyclePhase};

#[derive(Clone, Debug)]
pub struct SupervisorStats {
    pub phase: LifecyclePhase,
    pub generation: u64,
    pub pid: Option<u32>,
    pub initialized: bool,
    pub updating: bool,
    pub auto_restart: bool,
    pub error_count: u32,
    pub total_starts: u64,
    pub started_at: DateTime<Utc>,
    pub last_exit: Option<ExitRecord>,
}

impl SupervisorStats {
    pub fn summary(&self) -> String {
        format!(
            "Daemon[{}] phase={} pid={} errors={} starts={}",
            self.generation,
            self.phase,
            self.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
            self.error_count,
            self.total_starts
        )
    }
}
