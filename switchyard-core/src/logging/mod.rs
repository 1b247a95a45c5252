//! Switchyard logging
//!
//! A small logger for the standard `log` facade. Configure it once at startup;
//! everything else in the crate (and in handlers) just uses `log::info!` and
//! friends. Lines emitted while a request is being dispatched carry its
//! request id, session and route.
//!
//! # Example
//!
//! ```rust,no_run
//! use switchyard_core::logging::{LoggingConfig, LogFormat};
//!
//! let config = LoggingConfig::production()
//!     .with_stderr(LogFormat::Human)
//!     .with_context_field("service", "game-api");
//!
//! switchyard_core::logging::init_logging(&config).unwrap();
//! log::info!("Listening on {}", "ws://0.0.0.0:9000");
//! ```

pub mod config;
pub mod context;
pub mod entry;
pub mod formatter;

pub use config::{LogLevel, LoggingConfig};
pub use context::{session_tag, RequestContext};
pub use entry::{LogEntry, LogOutput};
pub use formatter::LogFormat;

use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install the Switchyard logger as the global `log` backend.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = init_logging_internal(config);
    });
    result
}

fn init_logging_internal(config: &LoggingConfig) -> anyhow::Result<()> {
    let logger = SwitchyardLogger::new(config.clone());
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(log::Level::from(config.level).to_level_filter());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

struct Writer {
    stream: Stream,
    format: LogFormat,
}

impl Writer {
    fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        let line = self.format.format_entry(entry);
        match self.stream {
            Stream::Stdout => writeln!(std::io::stdout().lock(), "{}", line),
            Stream::Stderr => writeln!(std::io::stderr().lock(), "{}", line),
        }
    }

    fn flush(&self) -> std::io::Result<()> {
        match self.stream {
            Stream::Stdout => std::io::stdout().flush(),
            Stream::Stderr => std::io::stderr().flush(),
        }
    }
}

struct SwitchyardLogger {
    config: LoggingConfig,
    writers: Vec<Writer>,
}

impl SwitchyardLogger {
    fn new(config: LoggingConfig) -> Self {
        let mut writers: Vec<Writer> = config
            .outputs
            .iter()
            .map(|output| match output {
                LogOutput::Stdout { format } => Writer {
                    stream: Stream::Stdout,
                    format: format.clone().unwrap_or_else(|| config.format.clone()),
                },
                LogOutput::Stderr { format } => Writer {
                    stream: Stream::Stderr,
                    format: format.clone().unwrap_or_else(|| config.format.clone()),
                },
            })
            .collect();

        if writers.is_empty() {
            writers.push(Writer { stream: Stream::Stdout, format: config.format.clone() });
        }

        Self { config, writers }
    }
}

impl log::Log for SwitchyardLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::from(self.config.level)
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = LogEntry::from_log_record(record, &self.config);
        for writer in &self.writers {
            let _ = writer.write(&entry);
        }
    }

    fn flush(&self) {
        for writer in &self.writers {
            let _ = writer.flush();
        }
    }
}
