//! Session bridge configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Per-session behaviour shared by every connection
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Seconds between keepalive pings
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    /// Channels every session listens on (comma-separated)
    pub listen_channels: Option<String>,
}

impl BridgeConfig {
    /// Get keepalive interval as Duration
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    /// Get listen channels as a vector
    pub fn listen_channels_list(&self) -> Vec<String> {
        self.listen_channels
            .as_ref()
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate bridge configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.keepalive_interval_secs == 0 || self.keepalive_interval_secs > 3600 {
            return Err(ValidationError::InvalidKeepaliveInterval);
        }
        if let Some(channel) = self
            .listen_channels_list()
            .into_iter()
            .find(|c| c.contains('\0') || c.len() > 63)
        {
            return Err(ValidationError::InvalidChannel(channel));
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: default_keepalive_interval(),
            listen_channels: None,
        }
    }
}

fn default_keepalive_interval() -> u64 {
    30
}
