use nodeguard_types::{GuardError, GuardResult, LocationData, NodeLocation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{GeoConfig, USER_AGENT};

/// Resolves the node's public address and its approximate location once, then
/// serves the cached result to status reports.
pub struct LocationResolver {
    client: reqwest::Client,
    ip_echo_url: String,
    geo_api_url: String,
    cache: Arc<RwLock<NodeLocation>>,
}

impl LocationResolver {
    pub fn new(config: &GeoConfig) -> GuardResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GuardError::Network(format!("Failed to build geo client: {}", e)))?;

        Ok(Self {
            client,
            ip_echo_url: config.ip_echo_url.trim_end_matches('/').to_string(),
            geo_api_url: config.geo_api_url.trim_end_matches('/').to_string(),
            cache: Arc::new(RwLock::new(NodeLocation::default())),
        })
    }

    pub fn current(&self) -> NodeLocation {
        self.cache.read().clone()
    }

    pub async fn refresh(&self) -> GuardResult<NodeLocation> {
        let ip = self.public_ip().await?;
        let data = if is_public_ip(&ip) {
            match self.lookup(&ip).await {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Geo lookup failed for {}: {}", ip, e);
                    None
                }
            }
        } else {
            None
        };

        let location = NodeLocation { ip: Some(ip), data };
        *self.cache.write() = location.clone();
        Ok(location)
    }

    pub fn spawn_refresh(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            match self.refresh().await {
                Ok(location) => debug!("Node location resolved: {:?}", location.ip),
                Err(e) => warn!("Failed to resolve node location: {}", e),
            }
        })
    }

    async fn public_ip(&self) -> GuardResult<String> {
        let body = self
            .client
            .get(&self.ip_echo_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GuardError::Network(format!("IP lookup failed: {}", e)))?
            .text()
            .await
            .map_err(|e| GuardError::Network(format!("IP lookup failed: {}", e)))?;

        let ip = body.trim().to_string();
        ip.parse::<IpAddr>()
            .map_err(|_| GuardError::Network(format!("IP echo returned {:?}", ip)))?;
        Ok(ip)
    }

    async fn lookup(&self, ip: &str) -> GuardResult<LocationData> {
        let url = format!("{}/{}/json/", self.geo_api_url, ip);

        let data = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GuardError::Network(format!("Geo lookup failed: {}", e)))?
            .json::<IpApiResponse>()
            .await
            .map_err(|e| GuardError::Network(format!("Invalid geo response: {}", e)))?;

        if data.error.unwrap_or(false) {
            return Err(GuardError::Network(
                data.reason.unwrap_or_else(|| "geo service refused the lookup".into()),
            ));
        }

        debug!("Geo lookup for {}: {:?} ({:?})", ip, data.city, data.country_code);
        Ok(data.into())
    }
}

pub fn is_public_ip(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified())
        }
        Ok(IpAddr::V6(v6)) => !(v6.is_loopback() || v6.is_unspecified()),
        Err(_) => false,
    }
}

#[derive(Deserialize)]
struct IpApiResponse {
    error: Option<bool>,
    reason: Option<String>,
    ip: Option<String>,
    city: Option<String>,
    region: Option<String>,
    region_code: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
    postal: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
}

impl From<IpApiResponse> for LocationData {
    fn from(r: IpApiResponse) -> Self {
        Self {
            country: r.country_name,
            country_code: r.country_code,
            region: r.region,
            region_code: r.region_code,
            city: r.city,
            postal: r.postal,
            ip: r.ip,
            latitude: r.latitude,
            longitude: r.longitude,
            timezone: r.timezone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_ip_filter() {
        assert!(is_public_ip("8.8.8.8"));
        assert!(!is_public_ip("127.0.0.1"));
        assert!(!is_public_ip("192.168.1.10"));
        assert!(!is_public_ip("10.0.0.1"));
        assert!(!is_public_ip("0.0.0.0"));
        assert!(!is_public_ip("::1"));
        assert!(!is_public_ip("localhost"));
    }

    #[test]
    fn test_ipapi_response_mapping() {
        let response: IpApiResponse = serde_json::from_str(
            r#"{
                "ip": "8.8.8.8",
                "city": "Mountain View",
                "region": "California",
                "region_code": "CA",
                "country_name": "United States",
                "country_code": "US",
                "postal": "94043",
                "latitude": 37.42,
                "longitude": -122.08,
                "timezone": "America/Los_Angeles"
            }"#,
        )
        .unwrap();

        let data: LocationData = response.into();
        assert_eq!(data.country.as_deref(), Some("United States"));
        assert_eq!(data.region_code.as_deref(), Some("CA"));
        assert_eq!(data.latitude, Some(37.42));
    }

    #[test]
    fn test_cache_starts_empty() {
        let resolver = LocationResolver::new(&GeoConfig::default()).unwrap();
        assert_eq!(resolver.current(), NodeLocation::default());
    }
}
