use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_GEO_API_URL, DEFAULT_IP_ECHO_URL};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub enabled: bool,
    pub ip_echo_url: String,
    pub geo_api_url: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ip_echo_url: DEFAULT_IP_ECHO_URL.to_string(),
            geo_api_url: DEFAULT_GEO_API_URL.to_string(),
        }
    }
}
