use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "nodeguard")]
#[command(version = BUILD_VERSION)]
#[command(about = "NodeGuard - Keeps a blockchain node daemon running, healthy and up to date")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, global = true, value_name = "FILE", help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'd', long, global = true, value_name = "DIR", env = "NODEGUARD_DATA_DIR", help = "Data directory path")]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text", help = "Output format")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Supervise the node daemon")]
    #[command(long_about = "Launch the node daemon and keep it running.\n\nThe guardian restarts the daemon when it crashes, stalls or reports a bad status, and installs new releases when automatic updates are enabled.")]
    Run {
        #[arg(long, value_name = "FILE", help = "Write PID to file")]
        pid_file: Option<PathBuf>,
    },

    #[command(about = "Validate configuration and probe the daemon once")]
    Check,

    #[command(about = "Show the daemon's current status")]
    Status,

    #[command(about = "Install the latest guardian release")]
    SelfUpdate,

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    #[command(about = "Show version information")]
    Version,
}

#[derive(Clone, Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Print the config file path")]
    Path,
    #[command(about = "Write a default config file")]
    Init {
        #[arg(short, long, help = "Overwrite existing configuration")]
        force: bool,
    },
}
