//! Client configuration.
//!
//! Everything the token machinery needs from its environment lives here:
//! the store's GraphQL endpoint, the three storage key names, the refresh
//! interval and the session header name. One `Config` is built at startup
//! and handed to each component.
//!
//! Configuration is stored at `~/.config/storesession/config.json` and can be
//! overridden from environment variables (see [`Config::with_env_overrides`]).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "storesession";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default interval between background token refreshes.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;

/// Header carrying the WooCommerce session token
pub const DEFAULT_SESSION_HEADER: &str = "woocommerce-session";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_AUTH_TOKEN_KEY: &str = "woo-auth-token";
const DEFAULT_SESSION_TOKEN_KEY: &str = "woo-session-token";
const DEFAULT_REFRESH_TOKEN_KEY: &str = "woo-refresh-token";

/// Environment variables read by [`Config::with_env_overrides`]
pub const ENV_ENDPOINT: &str = "STORE_GRAPHQL_URL";
pub const ENV_ENDPOINT_FALLBACK: &str = "GRAPHQL_ENDPOINT";
pub const ENV_AUTH_TOKEN_KEY: &str = "AUTH_TOKEN_LS_KEY";
pub const ENV_SESSION_TOKEN_KEY: &str = "SESSION_TOKEN_LS_KEY";
pub const ENV_REFRESH_TOKEN_KEY: &str = "REFRESH_TOKEN_LS_KEY";
pub const ENV_REFRESH_INTERVAL: &str = "AUTH_KEY_TIMEOUT";
pub const ENV_SESSION_HEADER: &str = "SESSION_HEADER_NAME";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub auth_token_key: String,
    pub session_token_key: String,
    pub refresh_token_key: String,
    pub refresh_interval_ms: u64,
    pub session_header: String,
    pub request_timeout_secs: u64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            auth_token_key: DEFAULT_AUTH_TOKEN_KEY.to_string(),
            session_token_key: DEFAULT_SESSION_TOKEN_KEY.to_string(),
            refresh_token_key: DEFAULT_REFRESH_TOKEN_KEY.to_string(),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            session_header: DEFAULT_SESSION_HEADER.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_username: None,
        }
    }
}

impl Config {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`).
    /// Unset or blank variables leave the current value alone.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(endpoint) = get(ENV_ENDPOINT).or_else(|| get(ENV_ENDPOINT_FALLBACK)) {
            self.endpoint = endpoint;
        }
        if let Some(key) = get(ENV_AUTH_TOKEN_KEY) {
            self.auth_token_key = key;
        }
        if let Some(key) = get(ENV_SESSION_TOKEN_KEY) {
            self.session_token_key = key;
        }
        if let Some(key) = get(ENV_REFRESH_TOKEN_KEY) {
            self.refresh_token_key = key;
        }
        if let Some(header) = get(ENV_SESSION_HEADER) {
            self.session_header = header;
        }
        if let Some(interval) = get(ENV_REFRESH_INTERVAL) {
            self.refresh_interval_ms = interval
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds, got {:?}", ENV_REFRESH_INTERVAL, interval))?;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            bail!("No GraphQL endpoint configured (set {})", ENV_ENDPOINT);
        }
        reqwest::Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid GraphQL endpoint {:?}", self.endpoint))?;
        if self.refresh_interval_ms == 0 {
            bail!("Refresh interval must be greater than zero");
        }
        let keys = [&self.auth_token_key, &self.session_token_key, &self.refresh_token_key];
        if keys.iter().any(|k| k.is_empty()) {
            bail!("Storage key names must not be empty");
        }
        if keys[0] == keys[1] || keys[1] == keys[2] || keys[0] == keys[2] {
            bail!("Storage key names must be distinct");
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for long-lived token storage
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Keychain service name for long-lived token storage
    pub fn keychain_service(&self) -> &'static str {
        APP_NAME
    }
}
