//! # Diagnostics
//!
//! The trackers, the resolver and the drivers report through an explicit
//! [`DiagnosticSink`] instead of a global logger, so they can be exercised in
//! isolation. Binaries wire the sink to the `log` facade and install
//! [`ConsoleLogger`] as its backend.

use crate::error::FetchError;
use chrono::Utc;
use log::{Level, LevelFilter, Metadata, Record};
use parking_lot::Mutex;

/// Destination for diagnostic messages produced by the core.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }
}

/// Forwards diagnostics to the `log` facade under a fixed target.
#[derive(Debug, Clone)]
pub struct LogDiagnostics {
    target: &'static str,
}

impl LogDiagnostics {
    pub fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl DiagnosticSink for LogDiagnostics {
    fn emit(&self, level: Level, message: &str) {
        log::log!(target: self.target, level, "{}", message);
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded (level, message) pairs.
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().clone()
    }

    /// Messages recorded at exactly `level`.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn emit(&self, level: Level, message: &str) {
        self.entries.lock().push((level, message.to_string()));
    }
}

/// `log` backend that writes timestamped lines to stderr.
///
/// Report output owns stdout, so diagnostics never interleave with it.
pub struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!(
            "{} {:<5} [{}] {}",
            Utc::now().format("%Y-%jT%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Installs [`ConsoleLogger`] as the process-wide logger.
pub fn init_console_logger(level: LevelFilter) -> Result<(), FetchError> {
    log::set_boxed_logger(Box::new(ConsoleLogger::new(level)))
        .map(|()| log::set_max_level(level))
        .map_err(|e| FetchError::InvalidConfig(format!("Logger already installed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn test_memory_diagnostics_records_levels() {
        let diag = MemoryDiagnostics::new();
        diag.info("There were no frames found");
        diag.warn("lookup failed for VCFC 12");

        assert_eq!(diag.entries().len(), 2);
        assert!(diag.contains(Level::Warn, "VCFC 12"));
        assert!(!diag.contains(Level::Error, "VCFC 12"));
        assert_eq!(diag.messages_at(Level::Info), vec!["There were no frames found"]);
    }

    #[test]
    fn test_console_logger_filters_by_level() {
        let logger = ConsoleLogger::new(LevelFilter::Warn);
        let warn = Metadata::builder().level(Level::Warn).build();
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&debug));
    }
}
