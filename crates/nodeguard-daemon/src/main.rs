mod cli;

use clap::Parser;
use cli::{
    handle_config, init_logging, peek_logging_config, run_checks, run_guardian,
    run_self_update, show_status, show_version, Cli, Commands,
};
use nodeguard_daemon::config::default_data_dir;
use nodeguard_types::GuardResult;

#[tokio::main]
async fn main() -> GuardResult<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config_path = cli.config.clone().unwrap_or_else(|| data_dir.join("config.toml"));
    let data_dir_override = cli.data_dir.as_deref();

    if let Err(e) = init_logging(&cli, &peek_logging_config(&config_path)) {
        eprintln!("{}", e);
    }

    match cli.command {
        Commands::Run { ref pid_file } => {
            let code = run_guardian(&config_path, data_dir_override, pid_file.clone()).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Check => {
            if run_checks(&config_path, data_dir_override).await? > 0 {
                std::process::exit(1);
            }
        }
        Commands::Status => {
            show_status(&config_path, data_dir_override, cli.format).await?;
        }
        Commands::SelfUpdate => {
            run_self_update(&config_path, data_dir_override).await?;
        }
        Commands::Config { ref action } => {
            handle_config(&config_path, data_dir_override, action.clone(), cli.format)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}
