use nodeguard_types::{GuardResult, Severity};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::fetcher::{ArchiveFetcher, CommandFetcher, UnconfiguredFetcher};
use super::release::{is_newer_release, normalize_version, GithubReleases, ReleaseSource};
use super::swap;
use crate::config::GuardConfig;
use crate::supervisor::{ShutdownReason, Supervisor};

const STOP_POLL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The daemon has not reported a version yet.
    NotReady,
    /// Another update holds the gate or the daemon is being stopped.
    Busy,
    UpToDate,
    Updated { version: String },
    /// A new guardian binary is installed and a relaunch was requested.
    Relaunching { version: String },
    Failed(String),
}

pub struct UpdateOrchestrator {
    supervisor: Supervisor,
    releases: Arc<dyn ReleaseSource>,
    daemon_fetcher: Arc<dyn ArchiveFetcher>,
    guardian_fetcher: Arc<dyn ArchiveFetcher>,
    daemon_repo: String,
    guardian_repo: String,
    daemon_path: PathBuf,
    guardian_path: PathBuf,
    guardian_version: String,
    check_daemon: bool,
    check_guardian: bool,
    interval: Duration,
}

impl UpdateOrchestrator {
    pub fn from_config(supervisor: Supervisor, config: &GuardConfig) -> GuardResult<Self> {
        let update = &config.update;
        let fetcher = |repo: &str| -> Arc<dyn ArchiveFetcher> {
            match update.fetch_command {
                Some(ref program) => Arc::new(CommandFetcher::new(
                    program.clone(),
                    update.fetch_args.clone(),
                    repo,
                )),
                None => Arc::new(UnconfiguredFetcher),
            }
        };

        let guardian_path = std::env::current_exe()?;

        Ok(Self {
            releases: Arc::new(GithubReleases::new(&update.api_url)?),
            daemon_fetcher: fetcher(&update.daemon_repo),
            guardian_fetcher: fetcher(&update.guardian_repo),
            daemon_repo: update.daemon_repo.clone(),
            guardian_repo: update.guardian_repo.clone(),
            daemon_path: config.node.executable_path(),
            guardian_path,
            guardian_version: env!("CARGO_PKG_VERSION").to_string(),
            check_daemon: update.daemon,
            check_guardian: update.guardian,
            interval: update.check_interval(),
            supervisor,
        })
    }

    /// Hourly (by default) check loop. Ends when the supervisor shuts down or
    /// a guardian relaunch was requested.
    pub async fn run(&self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.supervisor.is_shutting_down() {
                return;
            }

            if self.check_daemon {
                let outcome = self.check_daemon_update().await;
                debug!("Daemon update check: {:?}", outcome);
            }

            if self.check_guardian {
                if let UpdateOutcome::Relaunching { .. } = self.check_guardian_update().await {
                    return;
                }
            }
        }
    }

    pub async fn check_daemon_update(&self) -> UpdateOutcome {
        let Some(local) = self.supervisor.daemon_version() else {
            return UpdateOutcome::NotReady;
        };
        if self.supervisor.is_updating() {
            return UpdateOutcome::Busy;
        }

        let version = match self.newer_release(&self.daemon_repo, &local).await {
            Ok(Some(version)) => version,
            Ok(None) => {
                debug!("Daemon {} is up to date", local);
                return UpdateOutcome::UpToDate;
            }
            Err(e) => {
                let message = format!("Error checking for daemon updates: {}", e);
                self.supervisor.report(Severity::Error, &message, true);
                return UpdateOutcome::Failed(message);
            }
        };

        if let Err(e) = self.supervisor.try_begin_update() {
            debug!("Skipping daemon update: {}", e);
            return UpdateOutcome::Busy;
        }

        info!("Updating daemon {} -> {}", normalize_version(&local), version);

        self.supervisor.stop(false);
        self.supervisor.wait_for_child_exit(STOP_POLL).await;

        let outcome = match self.replace_daemon().await {
            Ok(()) => {
                self.supervisor.report(
                    Severity::Info,
                    &format!("The daemon was automatically updated to {}", version),
                    true,
                );
                UpdateOutcome::Updated { version }
            }
            Err(e) => {
                let message = format!("Error auto updating daemon: {}", e);
                self.supervisor.report(Severity::Error, &message, true);
                UpdateOutcome::Failed(message)
            }
        };

        self.supervisor.end_update();
        if let Err(e) = self.supervisor.start() {
            warn!("Failed to start daemon after update: {}", e);
        }

        outcome
    }

    async fn replace_daemon(&self) -> GuardResult<()> {
        let backup = swap::backup_binary(&self.daemon_path)?;

        let result = match self.daemon_fetcher.fetch(&self.daemon_path).await {
            Ok(()) => swap::validate_binary(&self.daemon_path),
            Err(e) => Err(e),
        };

        match (result, backup) {
            (Ok(()), Some(backup)) => {
                swap::discard_backup(&backup);
                Ok(())
            }
            (Ok(()), None) => Ok(()),
            (Err(e), Some(backup)) => {
                swap::restore_backup(&self.daemon_path, &backup)?;
                Err(e)
            }
            (Err(e), None) => Err(e),
        }
    }

    pub async fn check_guardian_update(&self) -> UpdateOutcome {
        if self.supervisor.is_updating() {
            return UpdateOutcome::Busy;
        }

        let version = match self
            .newer_release(&self.guardian_repo, &self.guardian_version)
            .await
        {
            Ok(Some(version)) => version,
            Ok(None) => {
                debug!("Guardian {} is up to date", self.guardian_version);
                return UpdateOutcome::UpToDate;
            }
            Err(e) => {
                let message = format!("Error checking for guardian updates: {}", e);
                self.supervisor.report(Severity::Error, &message, true);
                return UpdateOutcome::Failed(message);
            }
        };

        if let Err(e) = self.supervisor.try_begin_update() {
            debug!("Skipping guardian update: {}", e);
            return UpdateOutcome::Busy;
        }

        info!("Updating guardian {} -> {}", self.guardian_version, version);

        self.supervisor.stop(false);
        self.supervisor.wait_for_child_exit(STOP_POLL).await;

        match self.replace_guardian().await {
            Ok(()) => {
                self.supervisor.report(
                    Severity::Info,
                    &format!("The guardian was automatically updated to {}", version),
                    true,
                );
                self.supervisor
                    .request_shutdown(ShutdownReason::Relaunch(self.guardian_path.clone()));
                UpdateOutcome::Relaunching { version }
            }
            Err(e) => {
                let message = format!("Error auto updating guardian: {}", e);
                self.supervisor.report(Severity::Error, &message, true);
                self.supervisor.end_update();
                if let Err(e) = self.supervisor.start() {
                    warn!("Failed to start daemon after guardian update: {}", e);
                }
                UpdateOutcome::Failed(message)
            }
        }
    }

    /// One-shot guardian update for when no daemon is supervised by this
    /// process. Returns the installed version, `None` when already current.
    pub async fn install_guardian_update(&self) -> GuardResult<Option<String>> {
        let Some(version) = self
            .newer_release(&self.guardian_repo, &self.guardian_version)
            .await?
        else {
            return Ok(None);
        };

        self.replace_guardian().await?;
        Ok(Some(version))
    }

    async fn newer_release(&self, repo: &str, local: &str) -> GuardResult<Option<String>> {
        let release = self.releases.latest(repo).await?;
        Ok(is_newer_release(local, &release.tag_name).then(|| release.version().to_string()))
    }

    async fn replace_guardian(&self) -> GuardResult<()> {
        let staged = swap::staged_path(&self.guardian_path);
        let result = match self.guardian_fetcher.fetch(&staged).await {
            Ok(()) => swap::validate_binary(&staged)
                .and_then(|()| swap::install_staged(&self.guardian_path, &staged).map(|_| ())),
            Err(e) => Err(e),
        };

        if result.is_err() {
            remove_if_exists(&staged);
        }
        result
    }
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
impl UpdateOrchestrator {
    pub(crate) fn for_test(
        supervisor: Supervisor,
        releases: Arc<dyn ReleaseSource>,
        fetcher: Arc<dyn ArchiveFetcher>,
        daemon_path: PathBuf,
        guardian_path: PathBuf,
    ) -> Self {
        Self {
            supervisor,
            releases,
            daemon_fetcher: fetcher.clone(),
            guardian_fetcher: fetcher,
            daemon_repo: "ConcealNetwork/conceal-core".into(),
            guardian_repo: "ConcealNetwork/conceal-guardian".into(),
            daemon_path,
            guardian_path,
            guardian_version: "1.0.0".into(),
            check_daemon: true,
            check_guardian: true,
            interval: Duration::from_secs(3600),
        }
    }
}
