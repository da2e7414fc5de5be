use super::commands::Cli;
use nodeguard_daemon::config::{GuardConfig, LogLevel, LoggingConfig};
use nodeguard_types::{GuardError, GuardResult};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

fn filter_directive(cli: &Cli, logging: &LoggingConfig) -> String {
    if cli.quiet {
        return "warn".into();
    }
    match cli.verbose {
        0 => logging.level.to_string(),
        1 => format!("{},nodeguard_daemon=debug", logging.level),
        2 => LogLevel::Debug.to_string(),
        _ => LogLevel::Trace.to_string(),
    }
}

pub fn init_logging(cli: &Cli, logging: &LoggingConfig) -> GuardResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(cli, logging)));

    let log_file = cli.log_file.as_ref().or(logging.file.as_ref());
    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| GuardError::Config(format!("Failed to open log file {:?}: {}", path, e)))?;
            Some(
                fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    let to_stdout = file_layer.is_none();
    let json_layer = (to_stdout && logging.json).then(|| fmt::layer().json());
    let text_layer = (to_stdout && !logging.json).then(|| fmt::layer().with_target(cli.verbose >= 2));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| GuardError::Internal(format!("Failed to initialize logging: {}", e)))
}

/// Logging settings from the config file, before logging itself is up.
/// Falls back to defaults when the file is missing or invalid; the command
/// that loads the config for real reports the problem.
pub fn peek_logging_config(config_path: &Path) -> LoggingConfig {
    GuardConfig::load(config_path)
        .map(|c| c.logging)
        .unwrap_or_default()
}

/// Loads the config and applies the command line data directory on top.
pub fn load_config(config_path: &Path, data_dir: Option<&Path>) -> GuardResult<GuardConfig> {
    let mut config = GuardConfig::load(config_path)?;
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    Ok(config)
}

pub fn print_banner() {
    println!("\x1b[38;5;46m");
    println!(r#"
    _   _           _       ____                     _
   | \ | | ___   __| | ___ / ___|_   _  __ _ _ __ __| |
   |  \| |/ _ \ / _` |/ _ \ |  _| | | |/ _` | '__/ _` |
   | |\  | (_) | (_| |  __/ |_| | |_| | (_| | | | (_| |
   |_| \_|\___/ \__,_|\___|\____|\__,_|\__,_|_|  \__,_|"#);
    println!("\x1b[0m");
    println!("        \x1b[38;5;245mNode Daemon Guardian - v{}\x1b[0m", BUILD_VERSION);
    println!();
}

pub fn print_check(label: &str, result: &Result<String, String>) {
    match result {
        Ok(detail) if detail.is_empty() => println!("{:<22}\x1b[38;5;46mOK\x1b[0m", label),
        Ok(detail) => println!("{:<22}\x1b[38;5;46mOK\x1b[0m ({})", label, detail),
        Err(reason) => println!("{:<22}\x1b[38;5;196mFAIL\x1b[0m - {}", label, reason),
    }
}

pub fn print_warning(label: &str, reason: &str) {
    println!("{:<22}\x1b[38;5;226mWARN\x1b[0m - {}", label, reason);
}
