//! Configuration management
//!
//! Settings are read from `~/.pin-center/config.yaml` when present. Every
//! field has a default, so a partial file (or none at all) is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{DEFAULT_API_URL, DEFAULT_DEVICE_PAGE_URL, DEFAULT_SESSION_URL, DEFAULT_USER_AGENT};

/// Page size the repository requests from list endpoints.
pub const DEFAULT_REPOSITORY_PAGE_SIZE: u32 = 30;

/// Delay before a search query is sent, in milliseconds.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

/// Maximum concurrent single-item fetches while resolving search hits.
pub const DEFAULT_SEARCH_CONCURRENCY: usize = 8;

/// Trust window used when `trust_window` is selected without a duration.
pub const DEFAULT_TRUST_WINDOW_SECS: u64 = 5 * 60;

/// Longest accepted trust window (one year).
pub const MAX_TRUST_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// When the client fetches a new session before an authenticated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Fetch a session before every call. Costs one extra round trip per
    /// operation.
    EveryCall,
    /// Reuse a held token while it is younger than the window.
    TrustWindow {
        #[serde(default = "default_trust_window_secs")]
        seconds: u64,
    },
}

fn default_trust_window_secs() -> u64 {
    DEFAULT_TRUST_WINDOW_SECS
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        RefreshPolicy::EveryCall
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the memories API
    pub api_url: String,

    /// Cookie-authenticated session endpoint
    pub session_url: String,

    /// Account page scraped for device details
    pub device_page_url: String,

    pub user_agent: String,

    /// Repository page size
    pub page_size: u32,

    /// Search settings
    pub search_debounce_ms: u64,
    pub search_concurrency: usize,

    pub refresh: RefreshPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_url: DEFAULT_SESSION_URL.to_string(),
            device_page_url: DEFAULT_DEVICE_PAGE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_size: DEFAULT_REPOSITORY_PAGE_SIZE,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            search_concurrency: DEFAULT_SEARCH_CONCURRENCY,
            refresh: RefreshPolicy::default(),
        }
    }
}

impl Config {
    /// Loads `~/.pin-center/config.yaml`, or defaults if it does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads configuration from a specific YAML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_saphyr::from_str(content)?;
        Ok(config.normalized())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?
            .join(".pin-center");

        Ok(config_dir.join("config.yaml"))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// Strips trailing slashes from URLs, clamps counts to at least one and
    /// caps the trust window.
    fn normalized(mut self) -> Self {
        self.api_url = self.api_url.trim_end_matches('/').to_string();
        self.page_size = self.page_size.max(1);
        self.search_concurrency = self.search_concurrency.max(1);
        if let RefreshPolicy::TrustWindow { seconds } = &mut self.refresh {
            *seconds = (*seconds).min(MAX_TRUST_WINDOW_SECS);
        }
        self
    }
}
