use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::error::SharedError;

use crate::constants::{RECONNECT_INTERVAL_MS, RECONNECT_MAX_ATTEMPTS, SERIAL_BAUD_RATE};
use crate::transport::ReconnectPolicy;

/// Connection settings, read from an optional JSON file and then overridden
/// by command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    pub port: Option<String>,
    pub any_port: bool,
    pub baud: u32,
    pub reconnect_attempts: u32,
    pub reconnect_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: None,
            any_port: false,
            baud: SERIAL_BAUD_RATE,
            reconnect_attempts: RECONNECT_MAX_ATTEMPTS,
            reconnect_interval_ms: RECONNECT_INTERVAL_MS,
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self, SharedError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            SharedError::Config(format!(
                "failed to read config from '{}': {err}",
                path.display()
            ))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|err| {
            SharedError::Config(format!("invalid config file '{}': {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, port: Option<String>, any_port: bool, baud: Option<u32>) -> Self {
        if port.is_some() {
            self.port = port;
        }
        self.any_port |= any_port;
        if let Some(baud) = baud {
            self.baud = baud;
        }
        self
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            attempts: self.reconnect_attempts,
            interval: Duration::from_millis(self.reconnect_interval_ms),
        }
    }

    fn validate(&self) -> Result<(), SharedError> {
        if self.baud == 0 {
            return Err(SharedError::Config("baud rate must be non-zero".into()));
        }
        if self.reconnect_attempts == 0 {
            return Err(SharedError::Config(
                "reconnect_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
