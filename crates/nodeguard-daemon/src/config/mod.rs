mod constants;
mod daemon;
mod geo;
mod guard;
mod health;
mod logging;
mod notify;
mod pool;
mod restart;
mod types;
mod update;

pub use constants::*;
pub use daemon::DaemonConfig;
pub use geo::GeoConfig;
pub use guard::{default_data_dir, GuardConfig, RedactedConfig};
pub use health::HealthConfig;
pub use logging::LoggingConfig;
pub use notify::ErrorConfig;
pub use pool::PoolConfig;
pub use restart::RestartConfig;
pub use types::*;
pub use update::UpdateConfig;
