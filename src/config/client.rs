//! Client configuration
//!
//! Loads the session host address, timeouts and saved profiles from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::SessionProfile;

/// Configuration file name looked up in the working directory by default
pub const CONFIG_FILE: &str = "termlink.toml";

/// Errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Host of the session-hosting endpoint
    pub host: String,
    /// Port of the session-hosting endpoint
    pub port: u16,
    /// SSH ready timeout in milliseconds, forwarded to the host
    pub ssh_ready_timeout: u64,
    /// SSH keepalive interval in milliseconds, forwarded to the host
    pub keepalive_interval: u64,
    /// Terminal type string
    pub term: String,
    /// Delay before the initial command is typed into a new shell
    pub init_command_delay_ms: u64,
    /// Saved connection profiles
    pub profiles: Vec<SessionProfile>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5577,
            ssh_ready_timeout: 50_000,
            keepalive_interval: 10_000,
            term: "xterm-color".to_string(),
            init_command_delay_ms: 10,
            profiles: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get a saved profile by title
    pub fn profile(&self, title: &str) -> Option<&SessionProfile> {
        self.profiles.iter().find(|p| p.title == title)
    }

    pub fn init_command_delay(&self) -> Duration {
        Duration::from_millis(self.init_command_delay_ms)
    }
}
