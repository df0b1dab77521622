//! # SCM Security
//!
//! Authentication layer for control messages crossing the isolation boundary
//! between a trusted initializer and a less-trusted injected script.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `NonceManager`: One-time, time-limited tokens with replay prevention
//!   - `MessageSigner`: PBKDF2 key derivation, HMAC-SHA256 sign/verify
//!   - `MessageValidator`: Stateless structural checks
//!   - `SecuritySettings`: Levels, TTLs, capacities, env loading
//!
//! - **Logging** (`logging/`): Bounded structured security log
//!   - `SecurityLogger`: Buffer, wrappers, statistics, export
//!   - `SinkRouter`: Level-to-sink routing (`tracing` by default)
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `MessageAuthenticationApi`: Driving port (inbound API)
//!   - `NonceAuthority`, `EnvelopeInspector`, `SignatureVerifier`,
//!     `EntropySource`: Driven ports, substitutable in tests
//!
//! - **Service Layer** (`service.rs`): Orchestration
//!   - `CrossWorldValidator`: Implements `MessageAuthenticationApi`
//!
//! ## Security Levels
//!
//! | Level | Structure+Source | Nonce | Signature |
//! |---|---|---|---|
//! | basic | required | skipped | skipped |
//! | moderate | required | required | only if a key is configured |
//! | strict | required | required | mandatory |
//!
//! ## Invariants
//!
//! - A nonce validates successfully at most once, and never after its TTL
//! - Two concurrent validations of the same nonce cannot both succeed
//! - `validate_message` never panics or errors; rejections are results
//! - Keys and full nonces never reach the log
//!
//! ## Usage Example
//!
//! ```ignore
//! use scm_security::{CrossWorldValidator, Envelope, MessageSigner, MessageType, ValidatorOptions};
//! use serde_json::json;
//!
//! let signer = MessageSigner::new();
//! let key = signer.generate_signing_key("shared-secret", None)?;
//! let validator = CrossWorldValidator::new(
//!     ValidatorOptions::builder().signing_key(key.clone()).build()?,
//! );
//!
//! let nonce = validator.generate_nonce()?;
//! let payload = json!({"ready": true}).as_object().cloned().unwrap_or_default();
//! let envelope = Envelope::typed(MessageType::CategoryManagerReady, payload, "scm-injected")
//!     .with_nonce(nonce);
//! let envelope = signer.sign_envelope(envelope, Some(&key))?;
//!
//! let result = validator.validate_message(&envelope.to_value());
//! assert!(result.valid);
//! ```

pub mod domain;
pub mod logging;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use domain::{
    AlgorithmInfo, CheckReport, ConfigError, Envelope, LoggerConfig, MessageSigner, MessageType,
    MessageValidator, NonceConfig, NonceError, NonceManager, SecurityLevel, SecuritySettings,
    SignerConfig, SignerError, SigningKey, ValidationCode, ValidationDetails, ValidationError,
    ValidationErrorKind, ValidationResult, ValidatorConfig, ValidatorRules, ValidatorStatistics,
};
pub use logging::{
    CaptureSink, EventType, LogLevel, LogSink, SecurityLogEntry, SecurityLogger, SinkRouter,
    TracingSink,
};
pub use metrics::{MetricsSnapshot, ValidationMetrics};
pub use ports::inbound::MessageAuthenticationApi;
pub use ports::outbound::{
    EntropySource, EnvelopeInspector, NonceAuthority, OsEntropy, SignatureVerifier,
};
pub use service::{CrossWorldValidator, ValidatorOptions, ValidatorOptionsBuilder};
