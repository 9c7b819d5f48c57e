//! Application configuration structures.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::collector::{MIN_INTERVAL, NodeConfig};

use super::validation::{ConfigError, expand_env_vars};

/// Default capacity of the record and error channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = crate::sink::DEFAULT_CAPACITY;

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capacity of the record and error channels (default: 1024).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Nodes to poll.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            nodes: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(&expand_env_vars(content))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity must be positive".to_string(),
            ));
        }

        let mut seen_names = HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "node name cannot be empty".to_string(),
                ));
            }
            if !seen_names.insert(&node.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate node name: '{}'",
                    node.name
                )));
            }
            if node.host.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "node '{}': host cannot be empty",
                    node.name
                )));
            }
            if node.port == 0 {
                return Err(ConfigError::Invalid(format!(
                    "node '{}': port must be non-zero",
                    node.name
                )));
            }
            if node.timeout.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "node '{}': timeout must be positive",
                    node.name
                )));
            }
        }

        Ok(())
    }

    /// Nodes with polling enabled.
    pub fn enabled_nodes(&self) -> impl Iterator<Item = &NodeConfig> {
        self.nodes.iter().filter(|node| node.enabled)
    }

    fn normalize(&mut self) {
        for node in &mut self.nodes {
            if node.interval < MIN_INTERVAL {
                tracing::warn!(node = %node.name, min_interval = ?MIN_INTERVAL,
                    "Interval duration is less than minimum allowed. Using minimum duration."
                );
                node.interval = MIN_INTERVAL;
            }
        }
    }
}
