use nodeguard_types::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::constants::{EVENT_LOG_FILE, MIN_POLL_FAILURES, MIN_TERMINATE_TIMEOUT_SECS, MIN_UPDATE_INTERVAL_SECS, NODE_DATA_FILE};
use super::daemon::DaemonConfig;
use super::geo::GeoConfig;
use super::health::HealthConfig;
use super::logging::LoggingConfig;
use super::notify::ErrorConfig;
use super::pool::PoolConfig;
use super::restart::RestartConfig;
use super::types::{ConfigWarning, LogLevel, WarningSeverity};
use super::update::UpdateConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub data_dir: PathBuf,
    pub url: Option<String>,
    pub node: DaemonConfig,
    pub restart: RestartConfig,
    pub health: HealthConfig,
    pub pool: PoolConfig,
    pub error: ErrorConfig,
    pub update: UpdateConfig,
    pub geo: GeoConfig,
    pub logging: LoggingConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            url: None,
            node: DaemonConfig::default(),
            restart: RestartConfig::default(),
            health: HealthConfig::default(),
            pool: PoolConfig::default(),
            error: ErrorConfig::default(),
            update: UpdateConfig::default(),
            geo: GeoConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("nodeguard"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/nodeguard"))
}

impl GuardConfig {
    pub fn load(path: impl AsRef<Path>) -> GuardResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| GuardError::Config(format!("Failed to read config: {}", e)))?;

            toml::from_str(&contents)
                .map_err(|e| GuardError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> GuardResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| GuardError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GuardError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| GuardError::Config(format!("Failed to write config: {}", e)))?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("NODEGUARD_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(path) = std::env::var("NODEGUARD_DAEMON_PATH") {
            self.node.path = Some(PathBuf::from(path));
        }

        if let Ok(port) = std::env::var("NODEGUARD_RPC_PORT") {
            if let Ok(p) = port.parse() {
                self.node.port = p;
            }
        }

        if let Ok(name) = std::env::var("NODEGUARD_NODE_NAME") {
            self.node.name = Some(name);
        }

        if let Ok(url) = std::env::var("NODEGUARD_POOL_URL") {
            self.pool.notify_url = Some(url);
        }

        if let Ok(level) = std::env::var("NODEGUARD_LOG_LEVEL") {
            self.logging.level = LogLevel::parse_lossy(&level);
        }

        if std::env::var("NODEGUARD_LOG_JSON").is_ok() {
            self.logging.json = true;
        }

        if let Ok(flag) = std::env::var("NODEGUARD_AUTO_UPDATE") {
            self.update.daemon = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn validate(&self) -> GuardResult<()> {
        if self.node.port == 0 {
            return Err(GuardError::Config("Daemon RPC port cannot be 0".into()));
        }

        if self.node.rpc_timeout_secs == 0 {
            return Err(GuardError::Config("RPC timeout must be at least 1 second".into()));
        }

        if self.restart.max_close_errors == 0 {
            return Err(GuardError::Config(
                "restart.max_close_errors must be at least 1".into(),
            ));
        }

        if self.restart.error_forget_time == 0 {
            return Err(GuardError::Config(
                "restart.error_forget_time must be greater than 0".into(),
            ));
        }

        if self.restart.max_init_time == 0 || self.restart.max_block_time == 0 {
            return Err(GuardError::Config(
                "restart.max_init_time and restart.max_block_time must be greater than 0".into(),
            ));
        }

        if self.health.init_poll_secs == 0 || self.health.poll_interval_secs == 0 {
            return Err(GuardError::Config("Health poll intervals must be greater than 0".into()));
        }

        // A single failed poll is never reported on its own.
        if self.health.max_poll_failures < MIN_POLL_FAILURES {
            return Err(GuardError::Config(format!(
                "health.max_poll_failures must be at least {}",
                MIN_POLL_FAILURES
            )));
        }

        if let Some(url) = self.pool.enabled_url() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(GuardError::Config(format!("Invalid pool notify URL: {}", url)));
            }
            if self.pool.interval_secs == 0 {
                return Err(GuardError::Config("pool.interval_secs must be greater than 0".into()));
            }
        }

        if self.update.any_enabled() && self.update.check_interval_secs < MIN_UPDATE_INTERVAL_SECS {
            return Err(GuardError::Config(format!(
                "update.check_interval_secs must be at least {}",
                MIN_UPDATE_INTERVAL_SECS
            )));
        }

        Ok(())
    }

    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.restart.terminate_timeout < MIN_TERMINATE_TIMEOUT_SECS {
            warnings.push(ConfigWarning {
                severity: WarningSeverity::Medium,
                message: format!(
                    "restart.terminate_timeout of {}s is below the {}s floor",
                    self.restart.terminate_timeout, MIN_TERMINATE_TIMEOUT_SECS
                ),
                recommendation: format!("The daemon gets {}s before it is killed", MIN_TERMINATE_TIMEOUT_SECS),
            });
        }

        if self.restart.max_block_time <= self.health.poll_interval_secs {
            warnings.push(ConfigWarning {
                severity: WarningSeverity::High,
                message: "restart.max_block_time is not longer than the health poll interval".into(),
                recommendation: "Raise max_block_time or shorten health.poll_interval_secs".into(),
            });
        }

        if self.update.any_enabled() && self.update.fetch_command.is_none() {
            warnings.push(ConfigWarning {
                severity: WarningSeverity::High,
                message: "Automatic updates are enabled but update.fetch_command is not set".into(),
                recommendation: "Every update attempt will fail until a fetch command is configured".into(),
            });
        }

        if self.error.notify {
            warnings.push(ConfigWarning {
                severity: WarningSeverity::Low,
                message: "error.notify is enabled".into(),
                recommendation: "Notifications are only delivered when a notifier is attached".into(),
            });
        }

        warnings
    }

    pub fn log_warnings(&self) {
        for warning in self.warnings() {
            match warning.severity {
                WarningSeverity::High | WarningSeverity::Medium => {
                    warn!("{} ({})", warning.message, warning.recommendation)
                }
                WarningSeverity::Low => info!("{} ({})", warning.message, warning.recommendation),
            }
        }
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.data_dir.join(EVENT_LOG_FILE)
    }

    pub fn node_data_path(&self) -> PathBuf {
        self.data_dir.join(NODE_DATA_FILE)
    }

    pub fn redacted(&self) -> RedactedConfig<'_> {
        RedactedConfig(self)
    }
}

pub struct RedactedConfig<'a>(&'a GuardConfig);

fn redact_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => url.to_string(),
    }
}

impl std::fmt::Display for RedactedConfig<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = self.0;
        writeln!(f, "Data dir: {}", c.data_dir.display())?;
        writeln!(f, "Daemon: {} {}", c.node.executable_path().display(), c.node.args.join(" "))?;
        writeln!(f, "RPC: {} (timeout {}s)", c.node.rpc_base_url(), c.node.rpc_timeout_secs)?;
        writeln!(
            f,
            "Restart: max_close_errors={} forget={}s init={}s block={}s terminate={}s",
            c.restart.max_close_errors,
            c.restart.error_forget_time,
            c.restart.max_init_time,
            c.restart.max_block_time,
            c.restart.terminate_window().as_secs()
        )?;
        writeln!(
            f,
            "Pool: {}",
            c.pool.enabled_url().map(redact_url).unwrap_or_else(|| "disabled".into())
        )?;
        writeln!(f, "Notify on error: {}", c.error.notify)?;
        write!(
            f,
            "Update: daemon={} guardian={} every {}s",
            c.update.daemon, c.update.guardian, c.update.check_interval_secs
        )
    }
}
