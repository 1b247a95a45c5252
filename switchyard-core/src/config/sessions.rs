//! Sessions configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::session::SessionManagerConfig;

/// Sessions configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Evict idle sessions in the background
    /// Env: SWITCHYARD_SESSION_AUTO_CLEANUP
    /// Default: true
    pub auto_cleanup: bool,

    /// Session cleanup interval in seconds
    /// Env: SWITCHYARD_SESSION_CLEANUP_INTERVAL
    /// Default: 300 (5 minutes)
    pub cleanup_interval: u64,

    /// Idle time in seconds after which a session is destroyed
    /// Env: SWITCHYARD_SESSION_MAX_IDLE
    /// Default: 3600 (1 hour)
    pub max_idle: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { auto_cleanup: true, cleanup_interval: 300, max_idle: 3600 }
    }
}

impl SessionsConfig {
    pub fn merge(&mut self, other: Self) {
        self.auto_cleanup = other.auto_cleanup;
        self.cleanup_interval = other.cleanup_interval;
        self.max_idle = other.max_idle;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(enabled) = env::var("SWITCHYARD_SESSION_AUTO_CLEANUP") {
            self.auto_cleanup = enabled.parse().unwrap_or(true);
        }

        if let Ok(interval) = env::var("SWITCHYARD_SESSION_CLEANUP_INTERVAL") {
            if let Ok(i) = interval.parse() {
                self.cleanup_interval = i;
            }
        }

        if let Ok(max_idle) = env::var("SWITCHYARD_SESSION_MAX_IDLE") {
            if let Ok(m) = max_idle.parse() {
                self.max_idle = m;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cleanup_interval == 0 {
            bail!("Invalid cleanup_interval: must be greater than 0");
        }

        if self.max_idle == 0 {
            bail!("Invalid max_idle: must be greater than 0");
        }

        Ok(())
    }

    /// Settings for a [`crate::session::SessionManager`]
    pub fn manager_config(&self) -> SessionManagerConfig {
        SessionManagerConfig::new()
            .with_auto_cleanup(self.auto_cleanup)
            .with_cleanup_interval(Duration::from_secs(self.cleanup_interval))
            .with_max_idle(Duration::from_secs(self.max_idle))
    }
}
