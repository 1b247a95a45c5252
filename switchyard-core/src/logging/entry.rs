//! Log entries and output destinations

use std::collections::HashMap;

use serde_json::Value;

use crate::logging::{LogFormat, LogLevel, LoggingConfig, RequestContext};

/// Where logs should be sent
#[derive(Clone, Debug, PartialEq)]
pub enum LogOutput {
    Stdout {
        /// Override the default format for this output
        format: Option<LogFormat>,
    },
    Stderr {
        /// Override the default format for this output
        format: Option<LogFormat>,
    },
}

/// A structured log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Usually the module path
    pub target: String,
    /// Id of the request being handled when the entry was emitted
    pub request_id: Option<i64>,
    pub fields: HashMap<String, Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, target: String) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            level,
            message,
            target,
            request_id: None,
            fields: HashMap::new(),
        }
    }

    /// Build an entry from a `log::Record`, picking up the request context
    pub fn from_log_record(record: &log::Record, config: &LoggingConfig) -> Self {
        let mut entry = Self::new(
            record.level().into(),
            record.args().to_string(),
            record.target().to_string(),
        );

        for (key, value) in &config.context_fields {
            entry.fields.insert(key.clone(), Value::String(value.clone()));
        }

        if config.request_context {
            if let Some(context) = RequestContext::current() {
                entry = entry.with_context(&context);
            }
        }

        entry
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn with_context(mut self, context: &RequestContext) -> Self {
        self.request_id = Some(context.request_id);
        self.fields.insert("session".to_string(), Value::String(context.session_tag()));
        self.fields.insert("route".to_string(), Value::String(context.route.clone()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_with_request_context() {
        let entry = LogEntry::new(LogLevel::Info, "dispatch".to_string(), "core".to_string())
            .with_context(&RequestContext::new(12, "abc", "player/{id}"));

        assert_eq!(entry.request_id, Some(12));
        assert_eq!(entry.fields.get("route"), Some(&Value::String("player/{id}".into())));
    }

    #[test]
    fn test_entry_does_not_carry_full_session_id() {
        let session_id = "4f1c9a7be2d84c0f9e63a1b5c7d2e8f04f1c9a7be2d84c0f9e63a1b5c7d2e8f0";
        let entry = LogEntry::new(LogLevel::Info, "dispatch".to_string(), "core".to_string())
            .with_context(&RequestContext::new(12, session_id, "player/{id}"));

        assert_eq!(entry.fields.get("session"), Some(&Value::String("4f1c9a7b…".into())));
        let rendered = serde_json::to_string(&entry.fields).unwrap();
        assert!(!rendered.contains(session_id));
    }

    #[test]
    fn test_entry_without_context() {
        let entry = LogEntry::new(LogLevel::Warn, "x".to_string(), "t".to_string());
        assert!(entry.request_id.is_none());
        assert!(entry.fields.is_empty());
    }
}
