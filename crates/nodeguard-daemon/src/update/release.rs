use async_trait::async_trait;
use nodeguard_types::{GuardError, GuardResult};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::USER_AGENT;

#[derive(Clone, Debug, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
}

impl Release {
    pub fn version(&self) -> &str {
        normalize_version(&self.tag_name)
    }
}

/// Latest published release of a repository.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest(&self, repo: &str) -> GuardResult<Release>;
}

pub struct GithubReleases {
    client: Client,
    api_url: String,
}

impl GithubReleases {
    pub fn new(api_url: &str) -> GuardResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GuardError::Network(format!("Failed to build release client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReleaseSource for GithubReleases {
    async fn latest(&self, repo: &str) -> GuardResult<Release> {
        let url = format!("{}/repos/{}/releases", self.api_url, repo);
        debug!("HTTP GET: {}", url);

        let releases = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GuardError::Network(format!("Release lookup failed: {}", e)))?
            .json::<Vec<Release>>()
            .await
            .map_err(|e| GuardError::Update(format!("Invalid release list: {}", e)))?;

        latest_stable(releases)
            .ok_or_else(|| GuardError::Update(format!("No stable release published for {}", repo)))
    }
}

/// First non-draft, non-prerelease entry. The API lists newest first.
pub fn latest_stable(releases: Vec<Release>) -> Option<Release> {
    releases.into_iter().find(|r| !r.prerelease && !r.draft)
}

pub fn normalize_version(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
}

pub fn is_newer_release(local: &str, tag: &str) -> bool {
    normalize_version(local) != normalize_version(tag)
}
