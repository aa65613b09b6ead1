//! Configuration management for Pagecast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    pub scheduling: Option<SchedulingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Settings for the Graph API endpoints.
///
/// `base_url` overrides the host entirely (used by tests pointing at a
/// local mock server); otherwise the public host plus `api_version` is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub api_version: String,
    pub base_url: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_version: "v19.0".to_string(),
            base_url: None,
        }
    }
}

impl GraphConfig {
    /// The effective endpoint root, e.g. `https://graph.facebook.com/v19.0`
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://graph.facebook.com/{}", self.api_version),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between daemon polls for due posts and pending jobs
    pub poll_interval: u64,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/pagecast/pagecast.db".to_string(),
            },
            graph: GraphConfig::default(),
            scheduling: Some(SchedulingConfig { poll_interval: 60 }),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("PAGECAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("pagecast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("pagecast"))
}
