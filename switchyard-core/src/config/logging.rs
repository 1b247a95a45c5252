//! Logging configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::logging::{LogFormat, LogLevel};

/// The `[logging]` section; turned into a [`crate::logging::LoggingConfig`] at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Env: SWITCHYARD_LOG_LEVEL
    /// Default: "info"
    pub level: String,

    /// "human", "json" or "logfmt"
    /// Env: SWITCHYARD_LOG_FORMAT
    /// Default: "human"
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "human".to_string() }
    }
}

impl LoggingSection {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(level) = env::var("SWITCHYARD_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("SWITCHYARD_LOG_FORMAT") {
            self.format = format;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.level.parse::<LogLevel>().context("Invalid logging.level")?;
        self.format.parse::<LogFormat>().context("Invalid logging.format")?;
        Ok(())
    }
}
