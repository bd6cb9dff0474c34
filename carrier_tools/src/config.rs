use std::time::Duration;

use log::*;
use wms_common::{env_or_default, Secret};

pub const DEFAULT_CARRIER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub base_url: String,
    pub username: String,
    pub password: Secret<String>,
    /// Applied to every outbound request, connect time included.
    pub timeout: Duration,
    /// Upper bound on requests in flight against the platform at any moment.
    pub max_concurrent_requests: usize,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example-carrier.com/v1".to_string(),
            username: String::default(),
            password: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_CARRIER_TIMEOUT_SECS),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl CarrierConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("WMS_CARRIER_BASE_URL").unwrap_or_else(|_| {
            warn!("WMS_CARRIER_BASE_URL not set, using (probably useless) default");
            defaults.base_url.clone()
        });
        let username = std::env::var("WMS_CARRIER_USERNAME").unwrap_or_else(|_| {
            warn!("WMS_CARRIER_USERNAME not set. Carrier sync calls will be rejected until it is configured.");
            String::default()
        });
        let password = Secret::new(std::env::var("WMS_CARRIER_PASSWORD").unwrap_or_else(|_| {
            warn!("WMS_CARRIER_PASSWORD not set. Carrier sync calls will be rejected until it is configured.");
            String::default()
        }));
        let timeout = Duration::from_secs(env_or_default("WMS_CARRIER_TIMEOUT_SECS", DEFAULT_CARRIER_TIMEOUT_SECS));
        let max_concurrent_requests =
            env_or_default("WMS_CARRIER_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENT_REQUESTS).max(1);
        Self { base_url, username, password, timeout, max_concurrent_requests }
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}
