use super::commands::{ConfigAction, OutputFormat};
use super::utils::load_config;
use nodeguard_daemon::config::GuardConfig;
use nodeguard_types::{GuardError, GuardResult};
use std::path::Path;

pub fn handle_config(
    config_path: &Path,
    data_dir: Option<&Path>,
    action: Option<ConfigAction>,
    format: OutputFormat,
) -> GuardResult<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            if !config_path.exists() {
                println!("\x1b[38;5;245mNo configuration file found at {:?}, showing defaults\x1b[0m", config_path);
                println!("Run '\x1b[38;5;51mnodeguard config init\x1b[0m' to create one");
                println!();
            }
            let config = load_config(config_path, data_dir)?;
            match format {
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&config).map_err(|e| {
                        GuardError::Internal(format!("Failed to serialize config: {}", e))
                    })?;
                    println!("{}", json);
                }
                OutputFormat::Text => println!("{}", config.redacted()),
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", config_path.display());
        }
        Some(ConfigAction::Init { force }) => {
            init_config(config_path, data_dir, force)?;
            println!("\x1b[38;5;46m[+]\x1b[0m Configuration written to {:?}", config_path);
        }
    }
    Ok(())
}

fn init_config(config_path: &Path, data_dir: Option<&Path>, force: bool) -> GuardResult<()> {
    if config_path.exists() && !force {
        return Err(GuardError::Config(format!(
            "{:?} already exists (use --force to overwrite)",
            config_path
        )));
    }

    let mut config = GuardConfig::default();
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    config.save(config_path)
}
