//! Configuration management for Crosscast
//!
//! Destination base URLs, HTTP timeouts, and polling tuning are injected as
//! configuration. Every field has a default, so an absent or empty config
//! file yields a working setup against the public endpoints.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub facebook: FacebookConfig,
    #[serde(default)]
    pub linkedin: LinkedinConfig,
    #[serde(default)]
    pub instagram: InstagramConfig,
}

/// Timeouts applied to outgoing calls. Binary transfers get the larger
/// media timeout; metadata calls use the request timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_media_timeout")]
    pub media_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            media_timeout_secs: default_media_timeout(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default = "default_twitter_api_base")]
    pub api_base: String,
    #[serde(default = "default_twitter_upload_base")]
    pub upload_base: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: default_twitter_api_base(),
            upload_base: default_twitter_upload_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            graph_base: default_graph_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedinConfig {
    #[serde(default = "default_linkedin_api_base")]
    pub api_base: String,
}

impl Default for LinkedinConfig {
    fn default() -> Self {
        Self {
            api_base: default_linkedin_api_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
    /// Seconds between container status checks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Status checks before giving up and publishing best-effort.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            graph_base: default_graph_base(),
            poll_interval_secs: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

impl InstagramConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_media_timeout() -> u64 {
    120
}

fn default_twitter_api_base() -> String {
    "https://api.twitter.com".to_string()
}

fn default_twitter_upload_base() -> String {
    "https://upload.twitter.com".to_string()
}

fn default_graph_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_linkedin_api_base() -> String {
    "https://api.linkedin.com".to_string()
}

fn default_poll_interval() -> u64 {
    2
}

fn default_max_poll_attempts() -> u32 {
    15
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosscast").join("config.toml"))
}
