//! Configuration module for AppCourier
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation of the values the client
//! depends on (base URL, timeouts, poll interval).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Environment variable consulted when no token is present in the file.
pub const TOKEN_ENV_VAR: &str = "COURIER_API_TOKEN";

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.api.base_url) {
            return Err(ConfigError::ValidationError(
                "api.base_url must start with http:// or https://".into(),
            ));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.request_timeout_secs must be at least 1".into(),
            ));
        }

        if self.upload.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "upload.poll_interval_secs must be at least 1".into(),
            ));
        }

        if let Some(deadline) = self.upload.deadline_secs {
            if deadline == 0 {
                return Err(ConfigError::ValidationError(
                    "upload.deadline_secs must be at least 1 when set".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the Courier API, e.g. `https://api.courier.example`
    pub base_url: String,

    /// API token used as a bearer credential. Falls back to the
    /// `COURIER_API_TOKEN` environment variable when absent.
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Upload pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Fixed delivery-state poll interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Overall deadline for one asset upload, in seconds. Unset means the
    /// upload waits indefinitely for the server to finish processing.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl UploadConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            deadline_secs: None,
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    1
}
