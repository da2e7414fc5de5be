pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_EXIT_COMMAND: &str = "exit";

pub const DEFAULT_MAX_CLOSE_ERRORS: u32 = 3;
pub const DEFAULT_ERROR_FORGET_SECS: u64 = 600;
pub const DEFAULT_MAX_INIT_SECS: u64 = 900;
pub const DEFAULT_MAX_BLOCK_SECS: u64 = 1800;
pub const DEFAULT_TERMINATE_TIMEOUT_SECS: u64 = 60;
pub const MIN_TERMINATE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_COOPERATIVE_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_FATAL_EXIT_DELAY_SECS: u64 = 3;

pub const DEFAULT_INIT_POLL_SECS: u64 = 10;
pub const DEFAULT_HEALTH_POLL_SECS: u64 = 30;
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 3;
pub const MIN_POLL_FAILURES: u32 = 2;

pub const DEFAULT_POOL_INTERVAL_SECS: u64 = 30;
pub const POOL_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 3600;
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_RELEASES_API: &str = "https://api.github.com";
pub const DEFAULT_DAEMON_REPO: &str = "ConcealNetwork/conceal-core";
pub const DEFAULT_GUARDIAN_REPO: &str = "ConcealNetwork/conceal-guardian";

pub const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org";
pub const DEFAULT_GEO_API_URL: &str = "https://ipapi.co";

pub const USER_AGENT: &str = "NodeGuard";
pub const EVENT_LOG_FILE: &str = "debug.log";
pub const NODE_DATA_FILE: &str = "nodedata.json";

#[cfg(windows)]
pub const DAEMON_EXECUTABLE: &str = "conceald.exe";
#[cfg(not(windows))]
pub const DAEMON_EXECUTABLE: &str = "conceald";
