//! Configuration system for Switchyard
//!
//! # Configuration Hierarchy
//!
//! Values are resolved in the following order (highest priority wins):
//!
//! 1. **Code** (`with_*` builders)
//! 2. **Environment Variables** (`SWITCHYARD_*`)
//! 3. **Config File** (`switchyard.toml`)
//! 4. **Defaults**
//!
//! # Example
//!
//! ```no_run
//! use switchyard_core::config::{DispatcherConfig, SwitchyardConfig};
//!
//! let config = SwitchyardConfig::load()?
//!     .with_dispatcher(DispatcherConfig::default().with_expose_diagnostics(true));
//! config.validate()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod client;
pub mod dispatcher;
pub mod logging;
pub mod sessions;

pub use client::ClientConfig;
pub use dispatcher::DispatcherConfig;
pub use logging::LoggingSection;
pub use sessions::SessionsConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "switchyard.toml";

/// Complete Switchyard configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchyardConfig {
    pub dispatcher: DispatcherConfig,
    pub sessions: SessionsConfig,
    pub client: ClientConfig,
    pub logging: LoggingSection,
}

impl SwitchyardConfig {
    /// Defaults, then `switchyard.toml` if present, then environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Same as [`SwitchyardConfig::load`] with an explicit file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
        }

        config.apply_env_vars();
        Ok(config)
    }

    /// Parse a TOML file; missing sections and keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.dispatcher.merge(other.dispatcher);
        self.sessions.merge(other.sessions);
        self.client.merge(other.client);
        self.logging.merge(other.logging);
    }

    pub fn apply_env_vars(&mut self) {
        self.dispatcher.apply_env_vars();
        self.sessions.apply_env_vars();
        self.client.apply_env_vars();
        self.logging.apply_env_vars();
    }

    pub fn validate(&self) -> Result<()> {
        self.dispatcher.validate()?;
        self.sessions.validate()?;
        self.client.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    pub fn with_dispatcher(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_sessions(mut self, sessions: SessionsConfig) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    pub fn with_logging(mut self, logging: LoggingSection) -> Self {
        self.logging = logging;
        self
    }
}
