//! # Security Logger
//!
//! Bounded, structured, in-memory log of security events.
//!
//! - At most `capacity` entries (200 by default); the oldest is evicted first
//! - Every entry is routed to the sink registered for its level
//! - DEBUG entries reach their sink only in debug mode
//! - Logging never fails the caller: a panicking sink is contained and
//!   `log_event` reports the outcome as a boolean
//!
//! Wrappers never record secret-derived values in full. A nonce is logged as
//! its first eight characters followed by `...`; keys are never logged.

pub mod entry;
pub mod sink;

pub use entry::{EventType, LogLevel, SecurityLogEntry};
pub use sink::{CaptureSink, LogSink, SinkRouter, TracingSink};

use crate::domain::config::LoggerConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// Characters of a nonce kept in log entries.
const NONCE_PREFIX_LEN: usize = 8;

/// Oldest and newest timestamps in the buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeRange {
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

/// Counts over the buffered entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStatistics {
    pub total: usize,
    pub by_event_type: BTreeMap<EventType, usize>,
    pub by_level: BTreeMap<LogLevel, usize>,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_events: usize,
    pub oldest_event: Option<DateTime<Utc>>,
    pub newest_event: Option<DateTime<Utc>>,
}

/// Snapshot of the buffer with summary statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogExport {
    pub timestamp: DateTime<Utc>,
    pub logs: Vec<SecurityLogEntry>,
    pub statistics: LogStatistics,
    pub summary: ExportSummary,
}

pub struct SecurityLogger {
    entries: Mutex<VecDeque<SecurityLogEntry>>,
    capacity: usize,
    debug_mode: AtomicBool,
    sinks: SinkRouter,
}

impl SecurityLogger {
    /// Logger with default capacity, routing to `tracing`.
    pub fn new() -> Self {
        Self::with_config(LoggerConfig::default())
    }

    pub fn with_config(config: LoggerConfig) -> Self {
        Self::with_sinks(config, SinkRouter::default())
    }

    pub fn with_sinks(config: LoggerConfig, sinks: SinkRouter) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            debug_mode: AtomicBool::new(config.debug_mode),
            sinks,
        }
    }

    /// Record an event.
    ///
    /// Returns `false` without recording anything when `message` is empty.
    pub fn log_event(
        &self,
        event_type: EventType,
        level: LogLevel,
        message: impl Into<String>,
        details: Value,
    ) -> bool {
        let message = message.into();
        if message.is_empty() {
            return false;
        }

        let entry = SecurityLogEntry::new(event_type, level, message, details);

        {
            let mut entries = self.entries.lock();
            entries.push_back(entry.clone());
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }

        if level == LogLevel::Debug && !self.is_debug_mode() {
            return true;
        }

        let sink = self.sinks.sink_for(level);
        if catch_unwind(AssertUnwindSafe(|| sink.emit(&entry))).is_err() {
            tracing::warn!(event_type = entry.event_type.as_str(), "Security log sink panicked");
        }
        true
    }

    pub fn log_nonce_validated(&self, nonce: &str, context: Value) -> bool {
        let nonce_hash = nonce_fragment(nonce);
        self.log_event(
            EventType::NonceValidated,
            LogLevel::Info,
            format!("Nonce validated ({nonce_hash})"),
            with_context(json!({ "nonceHash": nonce_hash }), context),
        )
    }

    pub fn log_nonce_invalid(&self, reason: &str, context: Value) -> bool {
        self.log_event(
            EventType::NonceInvalid,
            LogLevel::Warn,
            format!("Nonce invalid: {reason}"),
            with_context(json!({ "reason": reason }), context),
        )
    }

    pub fn log_message_signed(&self, message_type: &str, context: Value) -> bool {
        self.log_event(
            EventType::MessageSigned,
            LogLevel::Info,
            format!("Message signed: {message_type}"),
            with_context(json!({ "messageType": message_type }), context),
        )
    }

    pub fn log_message_validated(&self, message_type: &str, context: Value) -> bool {
        self.log_event(
            EventType::MessageValidated,
            LogLevel::Info,
            format!("Message validated: {message_type}"),
            with_context(json!({ "messageType": message_type }), context),
        )
    }

    pub fn log_validation_failed(&self, failure_type: &str, reason: &str, context: Value) -> bool {
        self.log_event(
            EventType::ValidationFailed,
            LogLevel::Error,
            format!("Validation failed: {failure_type} - {reason}"),
            with_context(
                json!({ "failureType": failure_type, "reason": reason }),
                context,
            ),
        )
    }

    /// All buffered entries, oldest first.
    pub fn get_logs(&self) -> Vec<SecurityLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn get_logs_by_event_type(&self, event_type: EventType) -> Vec<SecurityLogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn get_logs_by_level(&self, level: LogLevel) -> Vec<SecurityLogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    pub fn clear_logs(&self) {
        self.entries.lock().clear();
    }

    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.debug_mode.store(enabled, Ordering::Relaxed);
    }

    pub fn is_debug_mode(&self) -> bool {
        self.debug_mode.load(Ordering::Relaxed)
    }

    pub fn get_statistics(&self) -> LogStatistics {
        let entries = self.entries.lock();
        statistics_of(entries.iter())
    }

    pub fn export_logs(&self) -> LogExport {
        let logs = self.get_logs();
        let statistics = statistics_of(logs.iter());
        let summary = ExportSummary {
            total_events: logs.len(),
            oldest_event: logs.first().map(|e| e.timestamp),
            newest_event: logs.last().map(|e| e.timestamp),
        };
        LogExport {
            timestamp: Utc::now(),
            logs,
            statistics,
            summary,
        }
    }

    /// [`export_logs`](Self::export_logs) as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.export_logs())
    }
}

impl Default for SecurityLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SecurityLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityLogger")
            .field("size", &self.size())
            .field("capacity", &self.capacity)
            .field("debug_mode", &self.is_debug_mode())
            .finish_non_exhaustive()
    }
}

fn statistics_of<'a>(entries: impl Iterator<Item = &'a SecurityLogEntry>) -> LogStatistics {
    let mut stats = LogStatistics::default();
    for entry in entries {
        stats.total += 1;
        *stats.by_event_type.entry(entry.event_type).or_default() += 1;
        *stats.by_level.entry(entry.level).or_default() += 1;
        if stats.time_range.first.is_none() {
            stats.time_range.first = Some(entry.timestamp);
        }
        stats.time_range.last = Some(entry.timestamp);
    }
    stats
}

fn nonce_fragment(nonce: &str) -> String {
    if nonce.is_empty() {
        return "unknown".to_string();
    }
    let prefix: String = nonce.chars().take(NONCE_PREFIX_LEN).collect();
    format!("{prefix}...")
}

/// Merge caller context into base details. Base keys win.
fn with_context(base: Value, context: Value) -> Value {
    let Value::Object(mut base) = base else {
        return base;
    };
    if let Value::Object(extra) = context {
        let mut merged: Map<String, Value> = extra;
        merged.append(&mut base);
        return Value::Object(merged);
    }
    Value::Object(base)
}
