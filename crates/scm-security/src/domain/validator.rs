//! # Message Validator
//!
//! Stateless structural checks on incoming envelopes. No cryptography and no
//! nonce store lookups happen here; the orchestrator decides which of these
//! checks apply at its security level.

use crate::domain::envelope::{MessageType, REQUIRED_FIELDS, SOURCE_PREFIX};
use crate::domain::errors::ValidationError;
use crate::ports::outbound::EnvelopeInspector;
use serde::Serialize;
use serde_json::Value;

/// Hex characters in a well-formed nonce.
pub const NONCE_HEX_LEN: usize = 32;

/// What the validator accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorRules {
    pub source_prefix: String,
    pub message_types: Vec<String>,
    pub nonce_length: usize,
}

impl Default for ValidatorRules {
    fn default() -> Self {
        Self {
            source_prefix: SOURCE_PREFIX.to_string(),
            message_types: MessageType::ALL.iter().map(|t| t.as_str().to_string()).collect(),
            nonce_length: NONCE_HEX_LEN,
        }
    }
}

/// Codes for [`MessageValidator::error_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    MissingRequiredField,
    InvalidSource,
    MissingNonce,
    InvalidNonceFormat,
    MissingSignature,
    InvalidMessageType,
    EmptyPayload,
}

/// Outcome of [`MessageValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl CheckReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Human-readable error messages.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageValidator {
    rules: ValidatorRules,
}

impl MessageValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: ValidatorRules) -> Self {
        Self { rules }
    }

    /// The envelope must be an object carrying all five members, with a
    /// non-empty map as payload. Every defect is reported.
    pub fn validate_message_structure(&self, message: &Value) -> Result<(), Vec<ValidationError>> {
        let Some(obj) = message.as_object() else {
            return Err(vec![structure("Message must be a non-null object")]);
        };

        let mut errors: Vec<ValidationError> = REQUIRED_FIELDS
            .iter()
            .filter(|field| !obj.contains_key(**field))
            .map(|field| structure(format!("Missing required field: {field}")))
            .collect();

        match obj.get("payload") {
            Some(Value::Object(payload)) if payload.is_empty() => {
                errors.push(structure("Payload cannot be empty"));
            }
            Some(Value::Object(_)) | None => {}
            Some(_) => errors.push(structure("Payload must be a non-empty object")),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn validate_source(&self, source: Option<&Value>) -> Result<(), ValidationError> {
        let source = match source {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => {
                return Err(ValidationError::Source(
                    "Source must be a non-empty string".into(),
                ))
            }
        };

        if !source.starts_with(&self.rules.source_prefix) {
            return Err(ValidationError::Source(format!(
                "Source must start with \"{}\"",
                self.rules.source_prefix
            )));
        }
        Ok(())
    }

    /// Format-only check: exactly 32 hex characters, either case.
    pub fn validate_nonce(&self, nonce: Option<&Value>) -> Result<(), ValidationError> {
        let nonce = match nonce {
            None | Some(Value::Null) => return Err(nonce_error("Nonce is required")),
            Some(Value::String(s)) if s.is_empty() => return Err(nonce_error("Nonce is required")),
            Some(Value::String(s)) => s,
            Some(_) => return Err(nonce_error("Nonce must be a string")),
        };

        if nonce.len() != self.rules.nonce_length || !nonce.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(nonce_error(format!(
                "Nonce must be {} hexadecimal characters",
                self.rules.nonce_length
            )));
        }
        Ok(())
    }

    /// Presence check only.
    pub fn validate_signature(&self, signature: Option<&Value>) -> Result<(), ValidationError> {
        match signature {
            None | Some(Value::Null) => Err(signature_error("Signature is required")),
            Some(Value::String(s)) if s.is_empty() => Err(signature_error("Signature is required")),
            Some(Value::String(s)) if s.trim().is_empty() => {
                Err(signature_error("Signature cannot be empty"))
            }
            Some(Value::String(_)) => Ok(()),
            Some(_) => Err(signature_error("Signature must be a string")),
        }
    }

    pub fn validate_message_type(
        &self,
        message_type: Option<&Value>,
    ) -> Result<(), ValidationError> {
        let message_type = match message_type {
            None | Some(Value::Null) => return Err(type_error("Message type is required")),
            Some(Value::String(s)) if s.is_empty() => {
                return Err(type_error("Message type is required"))
            }
            Some(Value::String(s)) => s,
            Some(_) => return Err(type_error("Message type must be a string")),
        };

        if !self.rules.message_types.iter().any(|t| t == message_type) {
            return Err(type_error(format!("Unknown message type: {message_type}")));
        }
        Ok(())
    }

    /// Run every check.
    ///
    /// A structural failure is returned alone. Otherwise the source, nonce,
    /// signature and type checks all run and all their errors are reported.
    pub fn validate(&self, message: &Value) -> CheckReport {
        if let Err(errors) = self.validate_message_structure(message) {
            return CheckReport::from_errors(errors);
        }

        let errors = [
            self.validate_source(message.get("source")),
            self.validate_nonce(message.get("nonce")),
            self.validate_signature(message.get("signature")),
            self.validate_message_type(message.get("type")),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        CheckReport::from_errors(errors)
    }

    /// Human-readable text for a validation code. `context` is the offending
    /// field name or value, where the code has one.
    pub fn error_message(&self, code: ValidationCode, context: Option<&str>) -> String {
        let context = context.unwrap_or("unknown");
        match code {
            ValidationCode::MissingRequiredField => format!("Missing required field: {context}"),
            ValidationCode::InvalidSource => format!(
                "Invalid message source: {context}. Source must start with '{}'",
                self.rules.source_prefix
            ),
            ValidationCode::MissingNonce => "Nonce is required for message validation".into(),
            ValidationCode::InvalidNonceFormat => format!(
                "Invalid nonce format: {context}. Nonce must be {} hexadecimal characters",
                self.rules.nonce_length
            ),
            ValidationCode::MissingSignature => {
                "Signature is required for message validation".into()
            }
            ValidationCode::InvalidMessageType => format!("Invalid message type: {context}"),
            ValidationCode::EmptyPayload => "Message payload cannot be empty".into(),
        }
    }

    pub fn rules(&self) -> &ValidatorRules {
        &self.rules
    }
}

impl EnvelopeInspector for MessageValidator {
    fn validate_message_structure(&self, message: &Value) -> Result<(), Vec<ValidationError>> {
        MessageValidator::validate_message_structure(self, message)
    }

    fn validate_source(&self, source: Option<&Value>) -> Result<(), ValidationError> {
        MessageValidator::validate_source(self, source)
    }

    fn validate_nonce(&self, nonce: Option<&Value>) -> Result<(), ValidationError> {
        MessageValidator::validate_nonce(self, nonce)
    }

    fn validate_signature(&self, signature: Option<&Value>) -> Result<(), ValidationError> {
        MessageValidator::validate_signature(self, signature)
    }

    fn validate_message_type(&self, message_type: Option<&Value>) -> Result<(), ValidationError> {
        MessageValidator::validate_message_type(self, message_type)
    }

    fn rules(&self) -> ValidatorRules {
        self.rules.clone()
    }
}

fn structure(msg: impl Into<String>) -> ValidationError {
    ValidationError::Structure(msg.into())
}

fn nonce_error(msg: impl Into<String>) -> ValidationError {
    ValidationError::NonceFormat(msg.into())
}

fn signature_error(msg: impl Into<String>) -> ValidationError {
    ValidationError::SignatureFormat(msg.into())
}

fn type_error(msg: impl Into<String>) -> ValidationError {
    ValidationError::MessageType(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_message() -> Value {
        json!({
            "type": "categoryManagerReady",
            "payload": {"ready": true},
            "source": "scm-injected",
            "nonce": "0123456789ABCDEF0123456789abcdef",
            "signature": "deadbeef"
        })
    }

    #[test]
    fn test_valid_message_passes() {
        let report = MessageValidator::new().validate(&valid_message());
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_structure_rejects_non_objects() {
        let validator = MessageValidator::new();
        for value in [Value::Null, json!([1, 2]), json!("msg"), json!(7)] {
            let errors = validator.validate_message_structure(&value).unwrap_err();
            assert_eq!(errors, vec![structure("Message must be a non-null object")]);
        }
    }

    #[test]
    fn test_structure_lists_every_missing_field() {
        let errors = MessageValidator::new()
            .validate_message_structure(&json!({"type": "categoryMoved"}))
            .unwrap_err();
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "Missing required field: payload",
                "Missing required field: source",
                "Missing required field: nonce",
                "Missing required field: signature",
            ]
        );
    }

    #[test]
    fn test_structure_payload_rules() {
        let validator = MessageValidator::new();
        let mut msg = valid_message();

        msg["payload"] = json!({});
        let errors = validator.validate_message_structure(&msg).unwrap_err();
        assert_eq!(errors[0].to_string(), "Payload cannot be empty");

        msg["payload"] = json!(["a"]);
        let errors = validator.validate_message_structure(&msg).unwrap_err();
        assert_eq!(errors[0].to_string(), "Payload must be a non-empty object");

        msg["payload"] = Value::Null;
        assert!(validator.validate_message_structure(&msg).is_err());
    }

    #[test]
    fn test_source_prefix() {
        let validator = MessageValidator::new();
        assert!(validator.validate_source(Some(&json!("scm-x"))).is_ok());

        let err = validator.validate_source(Some(&json!("evil"))).unwrap_err();
        assert_eq!(err.to_string(), "Source must start with \"scm-\"");

        let err = validator.validate_source(Some(&json!(""))).unwrap_err();
        assert_eq!(err.to_string(), "Source must be a non-empty string");
        assert!(validator.validate_source(None).is_err());
        assert!(validator.validate_source(Some(&json!(42))).is_err());
    }

    #[test]
    fn test_nonce_format() {
        let validator = MessageValidator::new();
        assert!(validator.validate_nonce(Some(&json!("a".repeat(32)))).is_ok());
        assert!(validator.validate_nonce(Some(&json!("A".repeat(32)))).is_ok());

        let err = validator.validate_nonce(Some(&json!("xyz"))).unwrap_err();
        assert_eq!(err.to_string(), "Nonce must be 32 hexadecimal characters");
        assert_eq!(
            validator.validate_nonce(None).unwrap_err().to_string(),
            "Nonce is required"
        );
        assert_eq!(
            validator.validate_nonce(Some(&json!(12))).unwrap_err().to_string(),
            "Nonce must be a string"
        );
    }

    #[test]
    fn test_signature_presence() {
        let validator = MessageValidator::new();
        assert!(validator.validate_signature(Some(&json!("ab"))).is_ok());
        assert_eq!(
            validator.validate_signature(Some(&json!(""))).unwrap_err().to_string(),
            "Signature is required"
        );
        assert_eq!(
            validator.validate_signature(Some(&json!("   "))).unwrap_err().to_string(),
            "Signature cannot be empty"
        );
        assert_eq!(
            validator.validate_signature(Some(&json!(true))).unwrap_err().to_string(),
            "Signature must be a string"
        );
    }

    #[test]
    fn test_message_type_closed_set() {
        let validator = MessageValidator::new();
        for t in MessageType::ALL {
            assert!(validator.validate_message_type(Some(&json!(t.as_str()))).is_ok());
        }
        let err = validator.validate_message_type(Some(&json!("ready"))).unwrap_err();
        assert_eq!(err.to_string(), "Unknown message type: ready");
    }

    #[test]
    fn test_structure_failure_short_circuits() {
        let msg = json!({"type": "bogus", "source": "evil", "nonce": "x", "signature": ""});
        let report = MessageValidator::new().validate(&msg);
        assert!(!report.valid);
        assert_eq!(report.errors, vec![structure("Missing required field: payload")]);
    }

    #[test]
    fn test_component_errors_aggregate() {
        let msg = json!({
            "type": "bogus",
            "payload": {"k": 1},
            "source": "evil",
            "nonce": "short",
            "signature": ""
        });
        let report = MessageValidator::new().validate(&msg);
        assert!(!report.valid);
        assert_eq!(
            report.messages(),
            vec![
                "Source must start with \"scm-\"",
                "Nonce must be 32 hexadecimal characters",
                "Signature is required",
                "Unknown message type: bogus",
            ]
        );
    }

    #[test]
    fn test_error_messages() {
        let validator = MessageValidator::new();
        assert_eq!(
            validator.error_message(ValidationCode::MissingRequiredField, Some("nonce")),
            "Missing required field: nonce"
        );
        assert_eq!(
            validator.error_message(ValidationCode::InvalidMessageType, None),
            "Invalid message type: unknown"
        );
        assert!(validator
            .error_message(ValidationCode::InvalidSource, Some("evil"))
            .contains("'scm-'"));
    }

    #[test]
    fn test_custom_rules() {
        let validator = MessageValidator::with_rules(ValidatorRules {
            source_prefix: "ext-".into(),
            ..ValidatorRules::default()
        });
        assert!(validator.validate_source(Some(&json!("ext-page"))).is_ok());
        assert!(validator.validate_source(Some(&json!("scm-page"))).is_err());
    }
}
