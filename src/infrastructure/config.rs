use crate::domain::{config::PortConfig, error::PortLabResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Crate-level configuration: the template newly discovered sessions start
/// from and tuning for the receive path. This is global tooling
/// configuration, not per-session state; sessions themselves are never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabConfig {
    /// Configuration template for newly discovered ports
    #[serde(default)]
    pub defaults: PortConfig,
    /// How often open sessions poll the driver for buffered bytes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            defaults: PortConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl LabConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_path(path: &Path) -> PortLabResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LabConfig =
            toml::from_str(&content).map_err(|e| crate::domain::error::PortLabError::Config {
                message: format!("Failed to parse {}: {}", path.display(), e),
            })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
