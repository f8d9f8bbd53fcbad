//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: API
//! location, storage backend, timeouts and the last used login.
//!
//! Configuration is stored at `~/.config/internhub/config.json`. The token
//! encryption key never lives there; it comes from `INTERNHUB_TOKEN_KEY`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Role;
use crate::storage::StorageBackend;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "internhub";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the token encryption passphrase
pub const TOKEN_KEY_ENV: &str = "INTERNHUB_TOKEN_KEY";

/// Environment variable overriding the configured API base URL
pub const API_URL_ENV: &str = "INTERNHUB_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a refresh call. Every request queued behind the refresh
/// waits at most this long.
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set - the token encryption key is required")]
    MissingTokenKey(&'static str),

    #[error("Could not find {0} directory")]
    NoDirectory(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub storage: StorageBackend,
    pub request_timeout_secs: u64,
    /// 0 disables the refresh timeout
    pub refresh_timeout_secs: u64,
    pub last_email: Option<String>,
    pub last_role: Option<Role>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage: StorageBackend::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            last_email: None,
            last_role: None,
        }
    }
}

impl Config {
    /// Load from the default location, applying environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_base_url = url;
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or(ConfigError::NoDirectory("cache"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// The vault passphrase. Missing key is a startup error, not a runtime one.
    pub fn token_key() -> Result<String, ConfigError> {
        Self::token_key_from(std::env::var(TOKEN_KEY_ENV).ok())
    }

    fn token_key_from(value: Option<String>) -> Result<String, ConfigError> {
        value
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingTokenKey(TOKEN_KEY_ENV))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Option<Duration> {
        (self.refresh_timeout_secs > 0).then(|| Duration::from_secs(self.refresh_timeout_secs))
    }
}
