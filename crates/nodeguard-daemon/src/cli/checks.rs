use super::utils::{load_config, print_check, print_warning};
use nodeguard_daemon::config::WarningSeverity;
use nodeguard_daemon::rpc::{DaemonProbe, RpcProbe};
use nodeguard_daemon::update::swap;
use nodeguard_types::GuardResult;
use std::path::Path;

/// Runs the preflight checks. Returns the number of failures.
pub async fn run_checks(config_path: &Path, data_dir: Option<&Path>) -> GuardResult<usize> {
    println!("\x1b[38;5;46mNodeGuard Diagnostics\x1b[0m");
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(50));
    println!();

    let mut failed = 0;

    if !config_path.exists() {
        print_warning("Config file:", "Not found, using defaults");
    }

    let config = match load_config(config_path, data_dir) {
        Ok(config) => {
            print_check("Configuration:", &Ok(String::new()));
            config
        }
        Err(e) => {
            print_check("Configuration:", &Err(e.to_string()));
            println!();
            println!("\x1b[38;5;196m1 check failed\x1b[0m");
            return Ok(1);
        }
    };

    for warning in config.warnings() {
        let label = match warning.severity {
            WarningSeverity::High => "Warning (high):",
            WarningSeverity::Medium => "Warning:",
            WarningSeverity::Low => "Note:",
        };
        print_warning(label, &format!("{} ({})", warning.message, warning.recommendation));
    }

    if config.data_dir.is_dir() {
        print_check("Data directory:", &Ok(config.data_dir.display().to_string()));
    } else if config.data_dir.exists() {
        print_check("Data directory:", &Err("Not a directory".into()));
        failed += 1;
    } else {
        print_warning("Data directory:", "Will be created on start");
    }

    let binary = config.node.executable_path();
    let binary_check = swap::validate_binary(&binary)
        .map(|()| binary.display().to_string())
        .map_err(|e| e.to_string());
    if binary_check.is_err() {
        failed += 1;
    }
    print_check("Daemon binary:", &binary_check);

    let probe = RpcProbe::new(&config.node)?;
    match probe.info().await {
        Ok(info) if info.status.is_ok() => print_check(
            "Daemon RPC:",
            &Ok(format!("height {}, version {}", info.height, info.version)),
        ),
        Ok(info) => print_warning("Daemon RPC:", &format!("Status {}", info.status)),
        Err(e) => print_warning("Daemon RPC:", &format!("{} (is the daemon running?)", e)),
    }

    println!();
    if failed == 0 {
        println!("\x1b[38;5;46mAll checks passed\x1b[0m");
    } else {
        println!("\x1b[38;5;196m{} check(s) failed\x1b[0m", failed);
    }
    Ok(failed)
}
