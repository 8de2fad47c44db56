//! Configuration management for Gatehouse.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use gatehouse_common::constants::{
    AUTH_DISABLED, CAPTCHA_REFRESH_DELAY_MS, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_STORAGE_PATH, QR_POLL_INTERVAL_SECS, SMS_COUNTDOWN_SECS, endpoints, env,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Backend base URL; endpoint paths are appended to it
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Captcha fetch endpoint (absolute URL or path under `api_base_url`)
    #[serde(default = "default_captcha_get_url")]
    pub captcha_get_url: String,

    /// Captcha check endpoint (absolute URL or path under `api_base_url`)
    #[serde(default = "default_captcha_check_url")]
    pub captcha_check_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Durable key-value storage file
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Optional footer compliance string
    #[serde(default)]
    pub icp_number: Option<String>,

    /// Authentication switch; "0" disables login entirely
    #[serde(default = "default_auth_access")]
    pub auth_access: String,

    /// QR status poll interval in milliseconds
    #[serde(default = "default_qr_poll_interval")]
    pub qr_poll_interval_ms: u64,

    /// SMS resend countdown in seconds
    #[serde(default = "default_sms_countdown")]
    pub sms_countdown_secs: u32,

    /// Delay before the captcha refetches a challenge after a check
    #[serde(default = "default_captcha_refresh_delay")]
    pub captcha_refresh_delay_ms: u64,
}

/// Overrides applied on top of file and environment sources
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub storage_path: Option<PathBuf>,
}

// Default value functions
fn default_api_base_url() -> String { DEFAULT_API_BASE_URL.to_string() }
fn default_captcha_get_url() -> String { endpoints::CAPTCHA_GET.to_string() }
fn default_captcha_check_url() -> String { endpoints::CAPTCHA_CHECK.to_string() }
fn default_request_timeout() -> u64 { DEFAULT_REQUEST_TIMEOUT_SECS }
fn default_storage_path() -> PathBuf { PathBuf::from(DEFAULT_STORAGE_PATH) }
fn default_auth_access() -> String { "1".to_string() }
fn default_qr_poll_interval() -> u64 { QR_POLL_INTERVAL_SECS * 1000 }
fn default_sms_countdown() -> u32 { SMS_COUNTDOWN_SECS }
fn default_captcha_refresh_delay() -> u64 { CAPTCHA_REFRESH_DELAY_MS }

impl AppConfig {
    /// Load configuration from file and `GATEHOUSE_*` environment variables,
    /// then apply overrides
    pub fn load(config_path: &str, overrides: &ConfigOverrides) -> Result<Self> {
        if !Path::new(config_path).exists() {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix(env::CONFIG_PREFIX))
            .build()
            .context("Failed to load config sources")?;

        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;

        // Process-wide switches keep their historical unprefixed names.
        if let Ok(icp) = std::env::var(env::ICP_NUMBER) {
            config.icp_number = Some(icp);
        }
        if let Ok(access) = std::env::var(env::AUTH_ACCESS) {
            config.auth_access = access;
        }

        // Apply CLI overrides
        if let Some(ref api_base_url) = overrides.api_base_url {
            config.api_base_url = api_base_url.clone();
        }
        if let Some(ref storage_path) = overrides.storage_path {
            config.storage_path = storage_path.clone();
        }

        config.icp_number = config.icp_number.filter(|s| !s.trim().is_empty());
        Ok(config)
    }

    /// Returns true when authentication is switched off
    pub fn auth_disabled(&self) -> bool {
        self.auth_access == AUTH_DISABLED
    }

    /// Resolve an endpoint against the base URL; absolute URLs pass through
    pub fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn qr_poll_interval(&self) -> Duration {
        Duration::from_millis(self.qr_poll_interval_ms)
    }

    pub fn captcha_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.captcha_refresh_delay_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            captcha_get_url: default_captcha_get_url(),
            captcha_check_url: default_captcha_check_url(),
            request_timeout_secs: default_request_timeout(),
            storage_path: default_storage_path(),
            icp_number: None,
            auth_access: default_auth_access(),
            qr_poll_interval_ms: default_qr_poll_interval(),
            sms_countdown_secs: default_sms_countdown(),
            captcha_refresh_delay_ms: default_captcha_refresh_delay(),
        }
    }
}
