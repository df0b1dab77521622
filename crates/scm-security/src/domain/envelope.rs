//! # Cross-World Envelope
//!
//! The fixed-shape message exchanged between the trusted initializer and the
//! injected page script.
//!
//! ```text
//! {
//!   "type":      "categoryManagerReady" | "categoryMoved" | "syncCategories",
//!   "payload":   { ...non-empty map... },
//!   "source":    "scm-...",
//!   "nonce":     32 lowercase hex chars,
//!   "signature": hex HMAC-SHA256, or "" when unsigned
//! }
//! ```
//!
//! Validators consume the raw `serde_json::Value` as received from the
//! transport, since a hostile sender is not bound by this struct. Senders use
//! [`Envelope`] to build well-formed messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Every envelope source tag starts with this prefix.
pub const SOURCE_PREFIX: &str = "scm-";

/// Source tag used by the page-level injected script.
pub const SOURCE_INJECTED: &str = "scm-injected";

/// Source tag used by the extension content script.
pub const SOURCE_CONTENT_SCRIPT: &str = "scm-content-script";

/// The five envelope members, in wire order.
pub const REQUIRED_FIELDS: [&str; 5] = ["type", "payload", "source", "nonce", "signature"];

/// Name of the member that carries the signature and is excluded from signed content.
pub const SIGNATURE_FIELD: &str = "signature";

/// Closed set of control messages the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// The injected script finished initializing.
    #[serde(rename = "categoryManagerReady")]
    CategoryManagerReady,
    /// A category was moved in the tree.
    #[serde(rename = "categoryMoved")]
    CategoryMoved,
    /// Request to resynchronize the category tree.
    #[serde(rename = "syncCategories")]
    SyncCategories,
}

impl MessageType {
    /// All known message types.
    pub const ALL: [MessageType; 3] = [
        MessageType::CategoryManagerReady,
        MessageType::CategoryMoved,
        MessageType::SyncCategories,
    ];

    /// Wire name of this message type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::CategoryManagerReady => "categoryManagerReady",
            MessageType::CategoryMoved => "categoryMoved",
            MessageType::SyncCategories => "syncCategories",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A sender-side envelope.
///
/// `message_type` is kept as a string: the wire format allows any value and
/// only [`MessageValidator::validate_message_type`](crate::MessageValidator::validate_message_type)
/// decides whether it belongs to [`MessageType`].
///
/// Treat an envelope as immutable once signed. Changing any member other than
/// `signature` invalidates the signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: Map<String, Value>,
    pub source: String,
    pub nonce: String,
    pub signature: String,
}

impl Envelope {
    /// Creates an unsigned envelope with no nonce.
    pub fn new(
        message_type: impl Into<String>,
        payload: Map<String, Value>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
            source: source.into(),
            nonce: String::new(),
            signature: String::new(),
        }
    }

    /// Creates an unsigned envelope for a known message type.
    pub fn typed(
        message_type: MessageType,
        payload: Map<String, Value>,
        source: impl Into<String>,
    ) -> Self {
        Self::new(message_type.as_str(), payload, source)
    }

    /// Builder-style method to attach a nonce.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = nonce.into();
        self
    }

    /// Builder-style method to attach a signature.
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    /// Returns true if a non-empty signature is attached.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Converts to the wire representation handed to the transport.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::with_capacity(REQUIRED_FIELDS.len());
        obj.insert("type".into(), Value::String(self.message_type.clone()));
        obj.insert("payload".into(), Value::Object(self.payload.clone()));
        obj.insert("source".into(), Value::String(self.source.clone()));
        obj.insert("nonce".into(), Value::String(self.nonce.clone()));
        obj.insert(SIGNATURE_FIELD.into(), Value::String(self.signature.clone()));
        Value::Object(obj)
    }

    /// Parses a wire value. Returns `None` if any member is missing or has the
    /// wrong JSON type.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            message_type: obj.get("type")?.as_str()?.to_string(),
            payload: obj.get("payload")?.as_object()?.clone(),
            source: obj.get("source")?.as_str()?.to_string(),
            nonce: obj.get("nonce")?.as_str()?.to_string(),
            signature: obj.get(SIGNATURE_FIELD)?.as_str()?.to_string(),
        })
    }
}

/// Reads a string member of a wire envelope, if present and a string.
pub(crate) fn str_field<'a>(message: &'a Value, field: &str) -> Option<&'a str> {
    message.get(field).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ready".into(), Value::Bool(true));
        map
    }

    #[test]
    fn test_message_type_wire_names() {
        assert_eq!(
            "categoryMoved".parse::<MessageType>(),
            Ok(MessageType::CategoryMoved)
        );
        assert!("ready".parse::<MessageType>().is_err());
        assert_eq!(
            serde_json::to_value(MessageType::SyncCategories).unwrap(),
            json!("syncCategories")
        );
    }

    #[test]
    fn test_to_value_has_all_fields() {
        let env = Envelope::typed(MessageType::CategoryManagerReady, payload(), SOURCE_INJECTED)
            .with_nonce("ab".repeat(16));
        let value = env.to_value();

        for field in REQUIRED_FIELDS {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["type"], json!("categoryManagerReady"));
        assert_eq!(value["signature"], json!(""));
    }

    #[test]
    fn test_serde_matches_to_value() {
        let env = Envelope::new("categoryMoved", payload(), "scm-x").with_signature("00ff");
        assert_eq!(serde_json::to_value(&env).unwrap(), env.to_value());
    }

    #[test]
    fn test_from_value_rejects_wrong_types() {
        let value = json!({
            "type": "categoryMoved",
            "payload": [1, 2],
            "source": "scm-x",
            "nonce": "",
            "signature": ""
        });
        assert!(Envelope::from_value(&value).is_none());

        let env = Envelope::new("categoryMoved", payload(), "scm-x");
        assert_eq!(Envelope::from_value(&env.to_value()), Some(env));
    }
}
