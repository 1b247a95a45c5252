//! Log line formats

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::Value;

use crate::logging::LogEntry;

/// How log lines are rendered
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    /// Example: {"timestamp":"2024-01-15T10:30:00Z","level":"INFO","message":"Route registered","request_id":4}
    Json,

    /// Example: 2024-01-15 10:30:00.000 INFO  [switchyard_core::dispatch] Stream opened request_id=4
    Human,

    /// Example: timestamp=2024-01-15T10:30:00Z level=INFO target=switchyard_core message="Stream opened"
    Logfmt,
}

impl LogFormat {
    pub fn format_entry(&self, entry: &LogEntry) -> String {
        match self {
            LogFormat::Json => format_json(entry),
            LogFormat::Human => format_human(entry),
            LogFormat::Logfmt => format_logfmt(entry),
        }
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "human" | "text" => Ok(LogFormat::Human),
            "logfmt" => Ok(LogFormat::Logfmt),
            other => anyhow::bail!("Unknown log format '{}'", other),
        }
    }
}

// Sorted so output is stable from one line to the next
fn sorted_fields(entry: &LogEntry) -> BTreeMap<&str, &Value> {
    entry.fields.iter().map(|(k, v)| (k.as_str(), v)).collect()
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_json(entry: &LogEntry) -> String {
    let mut json = serde_json::Map::new();

    json.insert("timestamp".to_string(), Value::String(entry.timestamp.to_rfc3339()));
    json.insert("level".to_string(), Value::String(entry.level.to_string()));
    json.insert("message".to_string(), Value::String(entry.message.clone()));
    json.insert("target".to_string(), Value::String(entry.target.clone()));

    if let Some(request_id) = entry.request_id {
        json.insert("request_id".to_string(), Value::from(request_id));
    }

    for (key, value) in &entry.fields {
        json.insert(key.clone(), value.clone());
    }

    serde_json::to_string(&json).unwrap_or_else(|_| "Failed to serialize log entry".to_string())
}

fn format_human(entry: &LogEntry) -> String {
    let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
    let mut message =
        format!("{} {:5} [{}] {}", timestamp, entry.level.as_str(), entry.target, entry.message);

    if let Some(request_id) = entry.request_id {
        message.push_str(&format!(" request_id={}", request_id));
    }

    for (key, value) in sorted_fields(entry) {
        message.push_str(&format!(" {}={}", key, plain(value)));
    }

    message
}

fn format_logfmt(entry: &LogEntry) -> String {
    let quote = |s: &str| format!("\"{}\"", s.replace('"', "\\\""));
    let mut parts = vec![
        format!("timestamp={}", entry.timestamp.to_rfc3339()),
        format!("level={}", entry.level),
        format!("target={}", entry.target),
        format!("message={}", quote(&entry.message)),
    ];

    if let Some(request_id) = entry.request_id {
        parts.push(format!("request_id={}", request_id));
    }

    for (key, value) in sorted_fields(entry) {
        let rendered = match value {
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => quote(&plain(other)),
        };
        parts.push(format!("{}={}", key, rendered));
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, RequestContext};

    #[test]
    fn test_json_format() {
        let entry = LogEntry::new(LogLevel::Info, "Test message".to_string(), "test::module".to_string())
            .with_context(&RequestContext::new(3, "sess", "a/b"));

        let parsed: Value = serde_json::from_str(&LogFormat::Json.format_entry(&entry)).unwrap();
        assert_eq!(parsed["message"], "Test message");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["request_id"], 3);
        assert_eq!(parsed["session"], "sess");
    }

    #[test]
    fn test_human_format() {
        let entry = LogEntry::new(LogLevel::Error, "Handler failed".to_string(), "app".to_string())
            .with_field("attempt", Value::from(2));

        let formatted = LogFormat::Human.format_entry(&entry);
        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("[app] Handler failed"));
        assert!(formatted.contains("attempt=2"));
    }

    #[test]
    fn test_logfmt_quotes_messages() {
        let entry = LogEntry::new(LogLevel::Warn, "say \"hi\"".to_string(), "app".to_string());

        let formatted = LogFormat::Logfmt.format_entry(&entry);
        assert!(formatted.contains("level=WARN"));
        assert!(formatted.contains(r#"message="say \"hi\"""#));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
