//! Application configuration loaded once at startup from a TOML file.
//!
//! The file carries two sections: `[broker]` with the connection parameters
//! and `[topics]` mapping logical topic keys to wire-level topic paths.
//! Configuration problems are fatal; the process must not attempt to connect
//! with a broken or incomplete config.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or validating the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Port 0 is reserved and never a valid broker endpoint
    #[error("broker.port must be between 1 and 65535")]
    InvalidPort,
}

/// Connection parameters for the MQTT broker.
///
/// Credentials are optional; they are only passed to the broker when both
/// username and password are present and non-empty.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Keepalive interval in seconds the transport proves liveness at
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
}

fn default_keepalive() -> u64 {
    60
}

/// Complete application configuration: broker endpoint plus topic table
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    /// Logical topic key -> wire topic path
    pub topics: BTreeMap<String, String>,
}

impl AppConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&raw)?;
        debug!(
            host = %config.broker.host,
            port = config.broker.port,
            topics = config.topics.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    fn parse(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        if config.broker.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        Ok(config)
    }
}
