use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DaemonStatus {
    Ok,
    Other(String),
}

impl DaemonStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, DaemonStatus::Ok)
    }
}

impl Default for DaemonStatus {
    fn default() -> Self {
        DaemonStatus::Other(String::new())
    }
}

impl From<String> for DaemonStatus {
    fn from(value: String) -> Self {
        if value == "OK" {
            DaemonStatus::Ok
        } else {
            DaemonStatus::Other(value)
        }
    }
}

impl From<DaemonStatus> for String {
    fn from(value: DaemonStatus) -> Self {
        match value {
            DaemonStatus::Ok => "OK".to_string(),
            DaemonStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonStatus::Ok => write!(f, "OK"),
            DaemonStatus::Other(s) if s.is_empty() => write!(f, "unknown"),
            DaemonStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Response of the daemon's `/getinfo` endpoint. Fields the guardian does not
/// interpret are kept in `extra` so the status snapshot passes them through.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonInfo {
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub status: DaemonStatus,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub connections: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DaemonInfo {
    pub fn new(height: u64, status: DaemonStatus) -> Self {
        Self {
            height,
            status,
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub info: DaemonInfo,
    pub last_height_change: DateTime<Utc>,
    pub consecutive_timeouts: u32,
}

impl HealthSnapshot {
    pub fn height(&self) -> u64 {
        self.info.height
    }

    pub fn status(&self) -> &DaemonStatus {
        &self.info.status
    }
}
