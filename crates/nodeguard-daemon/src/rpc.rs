use async_trait::async_trait;
use nodeguard_types::{DaemonInfo, GuardError, GuardResult};
use reqwest::Client;
use tracing::debug;

use crate::config::{DaemonConfig, USER_AGENT};

/// One round trip to the daemon's info endpoint.
#[async_trait]
pub trait DaemonProbe: Send + Sync {
    async fn info(&self) -> GuardResult<DaemonInfo>;
}

pub struct RpcProbe {
    client: Client,
    url: String,
}

impl RpcProbe {
    pub fn new(config: &DaemonConfig) -> GuardResult<Self> {
        let client = Client::builder()
            .timeout(config.rpc_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GuardError::Network(format!("Failed to build RPC client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/getinfo", config.rpc_base_url()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DaemonProbe for RpcProbe {
    async fn info(&self) -> GuardResult<DaemonInfo> {
        debug!("HTTP GET: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GuardError::Rpc(format!("getinfo failed: {}", e)))?;

        let response = response
            .error_for_status()
            .map_err(|e| GuardError::Rpc(format!("getinfo returned an error: {}", e)))?;

        response
            .json::<DaemonInfo>()
            .await
            .map_err(|e| GuardError::Rpc(format!("Invalid getinfo response: {}", e)))
    }
}
