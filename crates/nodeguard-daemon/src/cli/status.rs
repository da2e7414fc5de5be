use super::commands::OutputFormat;
use super::utils::{load_config, print_banner};
use nodeguard_daemon::identity::read_node_id;
use nodeguard_daemon::rpc::{DaemonProbe, RpcProbe};
use nodeguard_types::{DaemonInfo, GuardError, GuardResult};
use serde::Serialize;
use std::path::Path;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    id: Option<String>,
    name: String,
    os: &'static str,
    guardian_version: &'static str,
    rpc_url: String,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    blockchain: Option<DaemonInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn show_status(
    config_path: &Path,
    data_dir: Option<&Path>,
    format: OutputFormat,
) -> GuardResult<()> {
    let config = load_config(config_path, data_dir)?;
    let probe = RpcProbe::new(&config.node)?;

    let (blockchain, error) = match probe.info().await {
        Ok(info) => (Some(info), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let report = StatusReport {
        id: read_node_id(&config.node_data_path()),
        name: config.node.display_name(),
        os: std::env::consts::OS,
        guardian_version: BUILD_VERSION,
        rpc_url: probe.url().to_string(),
        reachable: blockchain.is_some(),
        blockchain,
        error,
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| GuardError::Internal(format!("Failed to serialize status: {}", e)))?;
            println!("{}", json);
        }
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &StatusReport) {
    println!("\x1b[38;5;46mNode Status\x1b[0m");
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(50));
    println!("  Name:      \x1b[38;5;51m{}\x1b[0m", report.name);
    println!(
        "  Node ID:   {}",
        report.id.as_deref().unwrap_or("\x1b[38;5;245mnot generated yet\x1b[0m")
    );
    println!("  Guardian:  v{} ({})", report.guardian_version, report.os);
    println!("  RPC:       {}", report.rpc_url);
    println!();

    match (&report.blockchain, &report.error) {
        (Some(info), _) => {
            let status = if info.status.is_ok() {
                format!("\x1b[38;5;46m{}\x1b[0m", info.status)
            } else {
                format!("\x1b[38;5;196m{}\x1b[0m", info.status)
            };
            println!("  Status:    {}", status);
            println!("  Height:    {}", info.height);
            println!("  Version:   {}", info.version);
            println!("  Peers:     {}", info.connections.len());
        }
        (None, Some(error)) => {
            println!("  Status:    \x1b[38;5;196mUNREACHABLE\x1b[0m - {}", error);
        }
        (None, None) => {}
    }
}

pub fn show_version() {
    print_banner();
    println!("\x1b[38;5;46mBuild Information\x1b[0m");
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(50));
    println!("  Version:   \x1b[38;5;51m{}\x1b[0m", BUILD_VERSION);
    println!("  OS:        \x1b[38;5;245m{}/{}\x1b[0m", std::env::consts::OS, std::env::consts::ARCH);
    println!(
        "  Profile:   \x1b[38;5;245m{}\x1b[0m",
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );
    println!();
}
