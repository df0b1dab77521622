//! Output sinks for security log entries.
//!
//! Every level routes to its own sink. The default router sends all levels to
//! [`TracingSink`]; tests install a [`CaptureSink`] to observe what was emitted.

use crate::logging::entry::{LogLevel, SecurityLogEntry};
use parking_lot::Mutex;
use scm_telemetry::log_event;
use std::sync::Arc;

/// Component name attached to every emitted tracing event.
pub const COMPONENT: &str = "scm-security";

/// Destination for emitted entries.
pub trait LogSink: Send + Sync {
    fn emit(&self, entry: &SecurityLogEntry);
}

/// Forwards entries to the `tracing` subscriber at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, entry: &SecurityLogEntry) {
        let event_type = entry.event_type.as_str();
        match entry.level {
            LogLevel::Error => log_event!(
                error,
                COMPONENT,
                "security event",
                event_type,
                summary = %entry.message,
                details = %entry.details
            ),
            LogLevel::Warn => log_event!(
                warn,
                COMPONENT,
                "security event",
                event_type,
                summary = %entry.message,
                details = %entry.details
            ),
            LogLevel::Info => log_event!(
                info,
                COMPONENT,
                "security event",
                event_type,
                summary = %entry.message,
                details = %entry.details
            ),
            LogLevel::Debug => log_event!(
                debug,
                COMPONENT,
                "security event",
                event_type,
                summary = %entry.message,
                details = %entry.details
            ),
        }
    }
}

/// Records emitted entries in memory.
#[derive(Debug, Default)]
pub struct CaptureSink {
    entries: Mutex<Vec<SecurityLogEntry>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries emitted so far, oldest first.
    pub fn entries(&self) -> Vec<SecurityLogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl LogSink for CaptureSink {
    fn emit(&self, entry: &SecurityLogEntry) {
        self.entries.lock().push(entry.clone());
    }
}

/// Level-to-sink routing table.
#[derive(Clone)]
pub struct SinkRouter {
    error: Arc<dyn LogSink>,
    warn: Arc<dyn LogSink>,
    info: Arc<dyn LogSink>,
    debug: Arc<dyn LogSink>,
}

impl SinkRouter {
    /// Route every level to `sink`.
    pub fn uniform(sink: Arc<dyn LogSink>) -> Self {
        Self {
            error: Arc::clone(&sink),
            warn: Arc::clone(&sink),
            info: Arc::clone(&sink),
            debug: sink,
        }
    }

    /// Replace the sink for one level.
    pub fn with_level(mut self, level: LogLevel, sink: Arc<dyn LogSink>) -> Self {
        match level {
            LogLevel::Error => self.error = sink,
            LogLevel::Warn => self.warn = sink,
            LogLevel::Info => self.info = sink,
            LogLevel::Debug => self.debug = sink,
        }
        self
    }

    pub fn sink_for(&self, level: LogLevel) -> &Arc<dyn LogSink> {
        match level {
            LogLevel::Error => &self.error,
            LogLevel::Warn => &self.warn,
            LogLevel::Info => &self.info,
            LogLevel::Debug => &self.debug,
        }
    }
}

impl Default for SinkRouter {
    fn default() -> Self {
        Self::uniform(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for SinkRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRouter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::entry::EventType;
    use serde_json::json;

    fn entry(level: LogLevel) -> SecurityLogEntry {
        SecurityLogEntry::new(EventType::ValidationFailed, level, "x".into(), json!({}))
    }

    #[test]
    fn test_router_per_level() {
        let errors = Arc::new(CaptureSink::new());
        let rest = Arc::new(CaptureSink::new());
        let router = SinkRouter::uniform(rest.clone()).with_level(LogLevel::Error, errors.clone());

        router.sink_for(LogLevel::Error).emit(&entry(LogLevel::Error));
        router.sink_for(LogLevel::Info).emit(&entry(LogLevel::Info));
        router.sink_for(LogLevel::Warn).emit(&entry(LogLevel::Warn));

        assert_eq!(errors.len(), 1);
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_tracing_sink_without_subscriber() {
        TracingSink.emit(&entry(LogLevel::Debug));
        TracingSink.emit(&entry(LogLevel::Error));
    }
}
