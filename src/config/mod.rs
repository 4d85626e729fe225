//! Configuration for groupline
//!
//! This module is organized into submodules:
//! - `defaults` - Default constants and values
//!
//! Configuration is intentionally small: the coordinator exposes exactly the
//! knobs the reconciliation core honours and nothing else.

mod defaults;

pub use defaults::*;

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator configuration.
///
/// `CoordinatorConfig` carries the settings shared by every group member
/// spawned in a process: where the coordination service lives, how long its
/// sessions survive silence, and how wide the rebalance debounce window is.
///
/// # Example
///
/// ```rust
/// use groupline::CoordinatorConfig;
///
/// let mut config = CoordinatorConfig::default();
/// config.rebalance_delay_ms = 200;
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Coordination-service endpoint list
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Coordination-service session timeout in milliseconds
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// Rebalance debounce window in milliseconds
    #[serde(default = "default_rebalance_delay_ms")]
    pub rebalance_delay_ms: u64,
}

fn default_endpoints() -> Vec<String> {
    vec![DEFAULT_ENDPOINT.to_string()]
}

fn default_session_timeout_ms() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

fn default_rebalance_delay_ms() -> u64 {
    DEFAULT_REBALANCE_DELAY_MS
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            rebalance_delay_ms: DEFAULT_REBALANCE_DELAY_MS,
        }
    }
}

impl CoordinatorConfig {
    /// Rebalance debounce window as a [`Duration`]
    pub fn rebalance_delay(&self) -> Duration {
        Duration::from_millis(self.rebalance_delay_ms)
    }

    /// Session timeout as a [`Duration`]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    /// Validate the configuration, rejecting values the coordinator cannot
    /// operate with.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::missing("endpoints").into());
        }
        if self.rebalance_delay_ms == 0 {
            return Err(ConfigError::invalid_setting(
                "rebalance_delay_ms",
                "must be greater than zero",
            )
            .into());
        }
        if self.session_timeout_ms == 0 {
            return Err(ConfigError::invalid_setting(
                "session_timeout_ms",
                "must be greater than zero",
            )
            .into());
        }
        Ok(())
    }
}
