use nodeguard_types::{GuardError, GuardResult, NodeInfo};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::{PoolConfig, POOL_REQUEST_TIMEOUT_SECS, USER_AGENT};

/// Pushes the node's status document to a pool aggregator.
pub struct PoolNotifier {
    client: Client,
    url: String,
    interval: Duration,
}

impl PoolNotifier {
    /// `None` when no notify URL is configured.
    pub fn from_config(config: &PoolConfig) -> GuardResult<Option<Self>> {
        let Some(url) = config.enabled_url() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(POOL_REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GuardError::Network(format!("Failed to build pool client: {}", e)))?;

        Ok(Some(Self {
            client,
            url: url.trim().to_string(),
            interval: config.interval(),
        }))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn push(&self, info: &NodeInfo) -> GuardResult<()> {
        debug!("HTTP POST: {}", self.url);

        self.client
            .post(&self.url)
            .json(info)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GuardError::Network(format!("Pool notification failed: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_url() {
        assert!(PoolNotifier::from_config(&PoolConfig::default()).unwrap().is_none());

        let blank = PoolConfig {
            notify_url: Some(" ".into()),
            ..Default::default()
        };
        assert!(PoolNotifier::from_config(&blank).unwrap().is_none());
    }

    #[test]
    fn test_enabled_with_url() {
        let config = PoolConfig {
            notify_url: Some("https://pool.example/nodes/update".into()),
            interval_secs: 45,
        };
        let pool = PoolNotifier::from_config(&config).unwrap().unwrap();
        assert_eq!(pool.interval(), Duration::from_secs(45));
    }
}
