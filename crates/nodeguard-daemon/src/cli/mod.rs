mod checks;
mod commands;
mod config_cmd;
mod run;
mod self_update;
mod status;
mod utils;

pub use checks::run_checks;
pub use commands::{Cli, Commands, ConfigAction, OutputFormat};
pub use config_cmd::handle_config;
pub use run::run_guardian;
pub use self_update::run_self_update;
pub use status::{show_status, show_version};
pub use utils::{init_logging, load_config, peek_logging_config};
