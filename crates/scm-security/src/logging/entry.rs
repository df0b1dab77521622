//! Security log entry types.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Severity of a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of security events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    NonceGenerated,
    NonceGenerationFailed,
    NonceValidated,
    NonceInvalid,
    NonceExpired,
    MessageSigned,
    MessageValidated,
    ValidationFailed,
    SignatureMismatch,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NonceGenerated => "NONCE_GENERATED",
            EventType::NonceGenerationFailed => "NONCE_GENERATION_FAILED",
            EventType::NonceValidated => "NONCE_VALIDATED",
            EventType::NonceInvalid => "NONCE_INVALID",
            EventType::NonceExpired => "NONCE_EXPIRED",
            EventType::MessageSigned => "MESSAGE_SIGNED",
            EventType::MessageValidated => "MESSAGE_VALIDATED",
            EventType::ValidationFailed => "VALIDATION_FAILED",
            EventType::SignatureMismatch => "SIGNATURE_MISMATCH",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One buffered security event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub level: LogLevel,
    pub message: String,
    pub details: Value,
    /// `[timestamp] [LEVEL] [EVENT_TYPE] message`
    pub formatted: String,
}

impl SecurityLogEntry {
    pub fn new(event_type: EventType, level: LogLevel, message: String, details: Value) -> Self {
        let timestamp = Utc::now();
        let formatted = format!(
            "[{}] [{}] [{}] {}",
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            event_type,
            message
        );
        Self {
            timestamp,
            event_type,
            level,
            message,
            details,
            formatted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_formatted_line() {
        let entry = SecurityLogEntry::new(
            EventType::NonceInvalid,
            LogLevel::Warn,
            "Nonce invalid: expired".into(),
            json!({}),
        );
        assert!(entry.formatted.starts_with('['));
        assert!(entry
            .formatted
            .ends_with("[WARN] [NONCE_INVALID] Nonce invalid: expired"));
    }

    #[test]
    fn test_serialized_names() {
        let entry = SecurityLogEntry::new(
            EventType::MessageValidated,
            LogLevel::Info,
            "ok".into(),
            json!({"messageType": "categoryMoved"}),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["eventType"], json!("MESSAGE_VALIDATED"));
        assert_eq!(value["level"], json!("INFO"));
        assert_eq!(value["details"]["messageType"], json!("categoryMoved"));
    }
}
