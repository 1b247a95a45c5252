//! Client correlator configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout applied to calls that do not set their own, in milliseconds
    /// Env: SWITCHYARD_CLIENT_TIMEOUT_MS
    /// Default: 30000
    pub default_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { default_timeout_ms: 30_000 }
    }
}

impl ClientConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(timeout) = env::var("SWITCHYARD_CLIENT_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.default_timeout_ms = t;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == 0 {
            bail!("Invalid default_timeout_ms: must be greater than 0");
        }
        Ok(())
    }
}
