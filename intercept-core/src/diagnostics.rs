//! Diagnostic sinks
//!
//! Per-event failures never reach the caller of `register_interception`; they
//! are reported to the sink injected into each registration.

use std::sync::{Arc, Mutex};
use tracing::Level;

/// Receives diagnostics from the interception pipeline
pub trait DiagnosticSink: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards to `tracing` (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "intercept_core", "{}", message),
            Level::WARN => tracing::warn!(target: "intercept_core", "{}", message),
            Level::INFO => tracing::info!(target: "intercept_core", "{}", message),
            Level::DEBUG => tracing::debug!(target: "intercept_core", "{}", message),
            _ => tracing::trace!(target: "intercept_core", "{}", message),
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Keeps every record in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records at exactly `level`
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.records().iter().any(|(_, m)| m.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((level, message.to_string()));
        }
    }
}
