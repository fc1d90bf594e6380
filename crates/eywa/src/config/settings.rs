use crate::Result;
use eywa_rpc::{ConnectionConfig, DEFAULT_MAX_LINE_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Client configuration, stored as camelCase JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load config from file, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        super::validation::warn_unknown_fields(&content, "config.json");
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from [`default_config_path`](super::default_config_path), or
    /// defaults when there is no usable path.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_default() -> Result<Self> {
        match super::default_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Save config to file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Settings for the host connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcConfig {
    /// Give up on a call after this many milliseconds. Unset waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,

    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: None,
            max_line_length: default_max_line_length(),
        }
    }
}

impl RpcConfig {
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        let config = ConnectionConfig::default().with_max_line_length(self.max_line_length);
        match self.call_timeout_ms {
            Some(ms) => config.with_call_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}

/// Settings for direct transfers to object storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Skip TLS verification. Development only.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            accept_invalid_certs: false,
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn default_request_timeout() -> u64 {
    300_000
}
