//! # Security Errors
//!
//! Error types for nonce, signing, configuration and validation operations.
//!
//! Construction-time errors (`NonceError`, `SignerError`, `ConfigError`) are
//! returned as `Result`s because they indicate programmer or environment
//! mistakes. `ValidationError` describes why an incoming envelope was rejected
//! and is only ever surfaced inside a `ValidationResult`.

use serde::Serialize;
use thiserror::Error;

/// Errors from nonce generation and expiry sweeping.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NonceError {
    /// The secure random source failed. Nonce generation never falls back
    /// to a weaker generator.
    #[error("Secure random source unavailable: {0}")]
    EntropyUnavailable(String),

    /// The periodic sweep needs an async runtime to schedule its timer.
    #[error("No async runtime available to schedule the nonce cleanup timer")]
    NoRuntime,
}

/// Errors from key derivation and message signing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("Secret must be a non-empty string")]
    EmptySecret,

    #[error("Message must be a non-null object")]
    InvalidMessage,

    #[error("No signing key available")]
    MissingKey,

    #[error("Key derivation requires at least {minimum} iterations, got {requested}")]
    WeakIterations { requested: u32, minimum: u32 },

    #[error("Failed to serialize message: {0}")]
    Serialization(String),

    #[error("Signing key rejected by HMAC: {0}")]
    Key(String),
}

/// Errors from loading or validating configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid security level: {0} (expected basic, moderate or strict)")]
    InvalidSecurityLevel(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Discriminant of a [`ValidationError`], cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    Structure,
    Source,
    MessageType,
    NonceFormat,
    NonceInvalid,
    SignatureFormat,
    SignatureVerification,
    Configuration,
    Internal,
}

/// Reasons an envelope is rejected.
///
/// `NonceInvalid` covers unknown, expired and already consumed nonces alike;
/// the result never reveals which of the three was hit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The envelope shape is wrong (not an object, missing field, bad payload).
    #[error("{0}")]
    Structure(String),

    /// The source tag is missing or has the wrong prefix.
    #[error("{0}")]
    Source(String),

    /// The nonce is not 32 hexadecimal characters.
    #[error("{0}")]
    NonceFormat(String),

    /// The nonce is unknown, expired or already consumed.
    #[error("Nonce validation failed: unknown or expired nonce")]
    NonceInvalid,

    /// The signature field is missing or empty.
    #[error("{0}")]
    SignatureFormat(String),

    /// The signature does not match the envelope content under the key.
    #[error("Signature verification failed")]
    SignatureVerification,

    /// Signature checking is mandatory but no key is configured.
    #[error("Signing key not available for signature verification")]
    Configuration,

    /// Unexpected failure while running a stage.
    #[error("Validation error: {0}")]
    Internal(String),

    /// The message type is missing, not a string, or outside the closed
    /// enumeration.
    ///
    /// Only reported by [`MessageValidator::validate`](crate::MessageValidator::validate);
    /// the orchestrated pipeline does not gate on type.
    #[error("{0}")]
    MessageType(String),
}

impl ValidationError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            ValidationError::Structure(_) => ValidationErrorKind::Structure,
            ValidationError::MessageType(_) => ValidationErrorKind::MessageType,
            ValidationError::Source(_) => ValidationErrorKind::Source,
            ValidationError::NonceFormat(_) => ValidationErrorKind::NonceFormat,
            ValidationError::NonceInvalid => ValidationErrorKind::NonceInvalid,
            ValidationError::SignatureFormat(_) => ValidationErrorKind::SignatureFormat,
            ValidationError::SignatureVerification => ValidationErrorKind::SignatureVerification,
            ValidationError::Configuration => ValidationErrorKind::Configuration,
            ValidationError::Internal(_) => ValidationErrorKind::Internal,
        }
    }
}
