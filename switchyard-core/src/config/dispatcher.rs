//! Dispatcher configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Return the full error chain of unclassified failures to callers
    /// Env: SWITCHYARD_EXPOSE_DIAGNOSTICS
    /// Default: false
    pub expose_diagnostics: bool,

    /// Shortest session id the dispatcher will trust
    /// Env: SWITCHYARD_MIN_SESSION_ID_LENGTH
    /// Default: 64
    pub min_session_id_length: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { expose_diagnostics: false, min_session_id_length: 64 }
    }
}

impl DispatcherConfig {
    pub fn with_expose_diagnostics(mut self, expose: bool) -> Self {
        self.expose_diagnostics = expose;
        self
    }

    pub fn with_min_session_id_length(mut self, length: usize) -> Self {
        self.min_session_id_length = length;
        self
    }

    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_vars(&mut self) {
        if let Ok(expose) = env::var("SWITCHYARD_EXPOSE_DIAGNOSTICS") {
            self.expose_diagnostics = expose.parse().unwrap_or(false);
        }

        if let Ok(length) = env::var("SWITCHYARD_MIN_SESSION_ID_LENGTH") {
            if let Ok(l) = length.parse() {
                self.min_session_id_length = l;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_session_id_length == 0 {
            bail!("Invalid min_session_id_length: must be greater than 0");
        }
        Ok(())
    }
}
