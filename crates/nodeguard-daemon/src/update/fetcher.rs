use async_trait::async_trait;
use nodeguard_types::{GuardError, GuardResult};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Downloads and unpacks the latest release so that `target` ends up holding
/// the new executable.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, target: &Path) -> GuardResult<()>;
}

/// Delegates the download to an external program invoked as
/// `program [args...] <repo> <target>`.
pub struct CommandFetcher {
    program: PathBuf,
    args: Vec<String>,
    repo: String,
}

impl CommandFetcher {
    pub fn new(program: PathBuf, args: Vec<String>, repo: impl Into<String>) -> Self {
        Self {
            program,
            args,
            repo: repo.into(),
        }
    }
}

#[async_trait]
impl ArchiveFetcher for CommandFetcher {
    async fn fetch(&self, target: &Path) -> GuardResult<()> {
        info!("Fetching {} into {}", self.repo, target.display());
        debug!("Running {} {:?}", self.program.display(), self.args);

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.repo)
            .arg(target)
            .output()
            .await
            .map_err(|e| {
                GuardError::Update(format!("Failed to run {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GuardError::Update(format!(
                "Fetch command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Fails when no fetch command is configured.
pub struct UnconfiguredFetcher;

#[async_trait]
impl ArchiveFetcher for UnconfiguredFetcher {
    async fn fetch(&self, _target: &Path) -> GuardResult<()> {
        Err(GuardError::Update("update.fetch_command is not configured".into()))
    }
}
