use super::utils::{load_config, print_banner};
use nodeguard_daemon::supervisor::{ShutdownReason, Supervisor, SupervisorDeps};
use nodeguard_daemon::update::{swap, UpdateOrchestrator};
use nodeguard_types::{GuardError, GuardResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Supervises the daemon until a signal arrives or the supervisor gives up.
/// Returns the process exit code.
pub async fn run_guardian(
    config_path: &Path,
    data_dir: Option<&Path>,
    pid_file: Option<PathBuf>,
) -> GuardResult<i32> {
    print_banner();

    let config = Arc::new(load_config(config_path, data_dir)?);
    info!("Starting NodeGuard v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", config.data_dir);

    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| GuardError::Config(format!("Failed to create data directory: {}", e)))?;
    config.log_warnings();

    if let Some(ref pid_path) = pid_file {
        std::fs::write(pid_path, std::process::id().to_string())
            .map_err(|e| GuardError::Config(format!("Failed to write PID file: {}", e)))?;
        info!("PID file written: {:?}", pid_path);
    }

    let deps = SupervisorDeps::from_config(&config)?;
    info!("Node {} ({})", deps.identity.name, deps.identity.id);
    if let Some(ref location) = deps.location {
        location.clone().spawn_refresh();
    }

    let supervisor = Supervisor::new(config.clone(), deps);
    if let Err(e) = supervisor.start() {
        error!("Failed to start daemon: {}", e);
    }

    if config.update.any_enabled() {
        let orchestrator = UpdateOrchestrator::from_config(supervisor.clone(), &config)?;
        tokio::spawn(async move { orchestrator.run().await });
        info!("Update checks every {:?}", config.update.check_interval());
    }

    let reason = tokio::select! {
        reason = supervisor.wait_for_shutdown() => reason,
        _ = wait_for_signal() => ShutdownReason::Requested,
    };

    info!("Shutting down: {}", reason);
    supervisor.shutdown_gracefully().await;
    info!("{}", supervisor.stats().summary());

    if let Some(ref pid_path) = pid_file {
        let _ = std::fs::remove_file(pid_path);
    }

    if let ShutdownReason::Relaunch(ref binary) = reason {
        if let Err(e) = swap::relaunch(binary) {
            error!("{}", e);
            return Ok(1);
        }
    }

    info!("Shutdown complete");
    Ok(reason.exit_code())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint), Ok(mut sighup)) => {
                tokio::select! {
                    _ = sigterm.recv() => { info!("Received SIGTERM"); }
                    _ = sigint.recv() => { info!("Received SIGINT"); }
                    _ = sighup.recv() => { info!("Received SIGHUP"); }
                }
            }
            _ => {
                warn!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
        }
    }
}
