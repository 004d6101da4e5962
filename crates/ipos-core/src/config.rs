//! Configuration management.
//!
//! Holds the API base URL, request timeout, optional log file and the last
//! used login. Stored at `~/.config/ipos-session/config.json`; the
//! `IPOS_BASE_URL` environment variable overrides the stored base URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::api::IPosClient;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "ipos-session";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const BASE_URL_ENV: &str = "IPOS_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "https://iposweb.pl/api";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub base_url: Option<String>,
    pub last_username: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
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
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted token.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Base URL with the environment override applied.
    pub fn base_url(&self) -> String {
        self.resolve_base_url(std::env::var(BASE_URL_ENV).ok())
    }

    fn resolve_base_url(&self, env_override: Option<String>) -> String {
        env_override
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Build an API client from this configuration.
    pub fn client(&self) -> Result<IPosClient> {
        IPosClient::with_timeout(self.base_url(), self.request_timeout())
            .context("Failed to build HTTP client")
    }
}
