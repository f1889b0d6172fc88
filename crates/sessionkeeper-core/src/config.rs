//! Application configuration management.
//!
//! This module handles loading and saving the configuration, which includes
//! the backend base URL, the last "remember me" choice, the last used email,
//! and the timing knobs for the expiry clock and profile restoration.
//!
//! Configuration is stored at `~/.config/sessionkeeper/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::session::DEFAULT_HOME_PATH;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "sessionkeeper";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the backend base URL
pub const ENV_API_URL: &str = "SESSIONKEEPER_API_URL";

/// Environment variable overriding the last used email
pub const ENV_EMAIL: &str = "SESSIONKEEPER_EMAIL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// One tick per second, matching the countdown display granularity.
const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Warn six minutes before expiry.
const DEFAULT_WARNING_BEFORE_SECS: u64 = 6 * 60;

/// Profile fetch attempts during cold-boot restoration.
/// Five attempts one second apart cover a backend that is still starting.
const DEFAULT_PROFILE_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_PROFILE_RETRY_DELAY_MS: u64 = 1000;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where the persistent durability tier keeps its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    /// JSON file under the platform data directory
    #[default]
    File,
    /// OS keychain entry
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Last "remember me" choice, used to pre-select the tier on next login
    pub remember_me: bool,
    pub last_email: Option<String>,
    pub token_backend: TokenBackend,
    /// Location a signed-in user is taken to when leaving the login page
    pub home_path: String,
    pub tick_interval_ms: u64,
    pub warning_before_secs: u64,
    pub profile_retry_attempts: u32,
    pub profile_retry_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            remember_me: true,
            last_email: None,
            token_backend: TokenBackend::default(),
            home_path: DEFAULT_HOME_PATH.to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            warning_before_secs: DEFAULT_WARNING_BEFORE_SECS,
            profile_retry_attempts: DEFAULT_PROFILE_RETRY_ATTEMPTS,
            profile_retry_delay_ms: DEFAULT_PROFILE_RETRY_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when absent.
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

    /// Apply `SESSIONKEEPER_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        if let Ok(email) = std::env::var(ENV_EMAIL) {
            if !email.trim().is_empty() {
                self.last_email = Some(email.trim().to_string());
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persistent token file.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn warning_before(&self) -> Duration {
        Duration::from_secs(self.warning_before_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn profile_retry_delay(&self) -> Duration {
        Duration::from_millis(self.profile_retry_delay_ms)
    }
}
