use super::utils::load_config;
use nodeguard_daemon::supervisor::{Supervisor, SupervisorDeps};
use nodeguard_daemon::update::UpdateOrchestrator;
use nodeguard_types::GuardResult;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Installs the latest guardian release in place of the running binary. A
/// guardian already supervising the daemon picks it up on its next restart.
pub async fn run_self_update(config_path: &Path, data_dir: Option<&Path>) -> GuardResult<()> {
    let config = Arc::new(load_config(config_path, data_dir)?);
    let deps = SupervisorDeps::from_config(&config)?;
    let supervisor = Supervisor::new(config.clone(), deps);
    let orchestrator = UpdateOrchestrator::from_config(supervisor, &config)?;

    println!("Current version: \x1b[38;5;51m{}\x1b[0m", env!("CARGO_PKG_VERSION"));
    match orchestrator.install_guardian_update().await? {
        Some(version) => {
            info!("Guardian updated to {}", version);
            println!("\x1b[38;5;46m[+]\x1b[0m Updated to {}", version);
        }
        None => println!("\x1b[38;5;46m[+]\x1b[0m Already up to date"),
    }
    Ok(())
}
