use nodeguard_types::{GuardError, GuardResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Where a freshly fetched guardian binary waits before the swap.
pub fn staged_path(active: &Path) -> PathBuf {
    with_suffix(active, ".new")
}

/// Where the replaced guardian binary is kept after the swap.
pub fn retired_path(active: &Path) -> PathBuf {
    with_suffix(active, ".old")
}

pub fn backup_path(binary: &Path) -> PathBuf {
    with_suffix(binary, ".bak")
}

pub fn validate_binary(path: &Path) -> GuardResult<()> {
    let meta = std::fs::metadata(path)
        .map_err(|e| GuardError::Update(format!("{} is missing: {}", path.display(), e)))?;

    if !meta.is_file() {
        return Err(GuardError::Update(format!("{} is not a file", path.display())));
    }
    if meta.len() == 0 {
        return Err(GuardError::Update(format!("{} is empty", path.display())));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(GuardError::Update(format!("{} is not executable", path.display())));
        }
    }

    Ok(())
}

/// Copies `binary` aside. `None` when there is nothing to back up.
pub fn backup_binary(binary: &Path) -> GuardResult<Option<PathBuf>> {
    if !binary.exists() {
        return Ok(None);
    }

    let backup = backup_path(binary);
    std::fs::copy(binary, &backup)
        .map_err(|e| GuardError::Update(format!("Failed to back up {}: {}", binary.display(), e)))?;
    Ok(Some(backup))
}

pub fn restore_backup(binary: &Path, backup: &Path) -> GuardResult<()> {
    std::fs::rename(backup, binary).map_err(|e| {
        GuardError::Update(format!("Failed to restore {}: {}", binary.display(), e))
    })?;
    info!("Restored {} from backup", binary.display());
    Ok(())
}

pub fn discard_backup(backup: &Path) {
    if let Err(e) = std::fs::remove_file(backup) {
        warn!("Failed to remove {}: {}", backup.display(), e);
    }
}

/// Moves `active` to its retired name and `staged` into its place. The
/// active binary is put back when the second rename fails.
pub fn install_staged(active: &Path, staged: &Path) -> GuardResult<PathBuf> {
    let retired = retired_path(active);
    if retired.exists() {
        std::fs::remove_file(&retired).map_err(|e| {
            GuardError::Update(format!("Failed to remove {}: {}", retired.display(), e))
        })?;
    }

    std::fs::rename(active, &retired).map_err(|e| {
        GuardError::Update(format!("Failed to move {} aside: {}", active.display(), e))
    })?;

    if let Err(e) = std::fs::rename(staged, active) {
        if let Err(undo) = std::fs::rename(&retired, active) {
            warn!("Failed to put {} back: {}", active.display(), undo);
        }
        return Err(GuardError::Update(format!(
            "Failed to install {}: {}",
            staged.display(),
            e
        )));
    }

    info!("Installed new binary at {}", active.display());
    Ok(retired)
}

/// Replaces the current process with `binary`, passing the original
/// arguments. Only returns on failure.
#[cfg(unix)]
pub fn relaunch(binary: &Path) -> GuardResult<()> {
    use std::os::unix::process::CommandExt;

    let err = std::process::Command::new(binary)
        .args(std::env::args_os().skip(1))
        .exec();
    Err(GuardError::Update(format!("Failed to relaunch {}: {}", binary.display(), err)))
}

#[cfg(not(unix))]
pub fn relaunch(binary: &Path) -> GuardResult<()> {
    std::process::Command::new(binary)
        .args(std::env::args_os().skip(1))
        .spawn()
        .map_err(|e| GuardError::Update(format!("Failed to relaunch {}: {}", binary.display(), e)))?;
    Ok(())
}
