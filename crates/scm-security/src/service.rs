//! # Cross-World Validator Service
//!
//! Application service that implements [`MessageAuthenticationApi`] by running
//! every received envelope through a sequential, short-circuiting pipeline:
//!
//! ```text
//! structure ─▶ source ─▶ nonce ─▶ signature ─▶ accept
//!     │           │         │          │
//!     └───────────┴─────────┴──────────┴──▶ reject
//!
//! nonce: moderate and strict. signature: strict, or moderate with a key.
//! ```
//!
//! Every rejection is logged to the security logger and counted in
//! [`ValidationMetrics`]. A panic inside any stage, including one raised by
//! an injected collaborator, becomes an `Internal` rejection.
//!
//! The message type is not gated here; only
//! [`MessageValidator::validate`](crate::MessageValidator::validate) checks it.

use crate::domain::config::{SecurityLevel, SecuritySettings};
use crate::domain::envelope::str_field;
use crate::domain::errors::{ConfigError, NonceError, ValidationError};
use crate::domain::nonce::NonceManager;
use crate::domain::result::{
    NonceStatistics, ValidationDetails, ValidationResult, ValidatorConfig, ValidatorStatistics,
};
use crate::domain::signer::{MessageSigner, SigningKey};
use crate::domain::validator::{MessageValidator, ValidatorRules};
use crate::logging::{EventType, LogLevel, SecurityLogEntry, SecurityLogger};
use crate::metrics::ValidationMetrics;
use crate::ports::inbound::MessageAuthenticationApi;
use crate::ports::outbound::{EnvelopeInspector, NonceAuthority, SignatureVerifier};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

// =============================================================================
// OPTIONS
// =============================================================================

/// Construction options. Every collaborator left unset gets a default
/// instance configured from `settings`.
#[derive(Default)]
pub struct ValidatorOptions {
    pub settings: SecuritySettings,
    pub signing_key: Option<SigningKey>,
    pub nonce_manager: Option<Arc<dyn NonceAuthority>>,
    pub message_validator: Option<Arc<dyn EnvelopeInspector>>,
    pub message_signer: Option<Arc<dyn SignatureVerifier>>,
    pub security_logger: Option<Arc<SecurityLogger>>,
}

impl ValidatorOptions {
    pub fn builder() -> ValidatorOptionsBuilder {
        ValidatorOptionsBuilder::new()
    }
}

/// Fluent builder for [`ValidatorOptions`].
///
/// # Example
///
/// ```ignore
/// let options = ValidatorOptions::builder()
///     .security_level(SecurityLevel::Moderate)
///     .signing_key(key)
///     .build()?;
/// let validator = CrossWorldValidator::new(options);
/// ```
#[derive(Default)]
pub struct ValidatorOptionsBuilder {
    options: ValidatorOptions,
}

impl ValidatorOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all settings, including the security level.
    pub fn settings(mut self, settings: SecuritySettings) -> Self {
        self.options.settings = settings;
        self
    }

    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.options.settings.level = level;
        self
    }

    pub fn signing_key(mut self, key: SigningKey) -> Self {
        self.options.signing_key = Some(key);
        self
    }

    pub fn nonce_manager(mut self, nonces: Arc<dyn NonceAuthority>) -> Self {
        self.options.nonce_manager = Some(nonces);
        self
    }

    pub fn message_validator(mut self, inspector: Arc<dyn EnvelopeInspector>) -> Self {
        self.options.message_validator = Some(inspector);
        self
    }

    pub fn message_signer(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.options.message_signer = Some(verifier);
        self
    }

    pub fn security_logger(mut self, logger: Arc<SecurityLogger>) -> Self {
        self.options.security_logger = Some(logger);
        self
    }

    /// Validate settings and finish.
    pub fn build(self) -> Result<ValidatorOptions, ConfigError> {
        self.options.settings.validate()?;
        Ok(self.options)
    }
}

// =============================================================================
// SERVICE
// =============================================================================

/// Cross-world message validator.
///
/// Instances share nothing unless collaborators are injected explicitly.
pub struct CrossWorldValidator {
    level: SecurityLevel,
    settings: SecuritySettings,
    signing_key: RwLock<Option<SigningKey>>,
    nonces: Arc<dyn NonceAuthority>,
    inspector: Arc<dyn EnvelopeInspector>,
    verifier: Arc<dyn SignatureVerifier>,
    logger: Arc<SecurityLogger>,
    metrics: ValidationMetrics,
}

impl CrossWorldValidator {
    /// Create a validator and schedule the nonce expiry sweep.
    ///
    /// Outside a tokio runtime the sweep cannot be scheduled; expired nonces
    /// are then still rejected on validation, and removed by
    /// [`NonceManager::cleanup_expired_nonces`] when called.
    pub fn new(options: ValidatorOptions) -> Self {
        let ValidatorOptions {
            settings,
            signing_key,
            nonce_manager,
            message_validator,
            message_signer,
            security_logger,
        } = options;

        let nonces = nonce_manager
            .unwrap_or_else(|| Arc::new(NonceManager::with_config(settings.nonce.clone())));
        // The default format check follows the nonce authority in use.
        let inspector = message_validator.unwrap_or_else(|| {
            Arc::new(MessageValidator::with_rules(ValidatorRules {
                nonce_length: nonces.config().token_len(),
                ..ValidatorRules::default()
            }))
        });
        let verifier = message_signer
            .unwrap_or_else(|| Arc::new(MessageSigner::with_config(settings.signer.clone())));
        let logger = security_logger
            .unwrap_or_else(|| Arc::new(SecurityLogger::with_config(settings.logger.clone())));

        if let Some(key) = &signing_key {
            verifier.set_signing_key(Some(key.clone()));
        }

        match nonces.start_cleanup() {
            Ok(()) => {}
            Err(NonceError::NoRuntime) => {
                warn!("No tokio runtime; nonce expiry sweep not scheduled");
            }
            Err(e) => warn!(error = %e, "Failed to schedule nonce expiry sweep"),
        }

        debug!(level = %settings.level, "Cross-world validator created");

        Self {
            level: settings.level,
            settings,
            signing_key: RwLock::new(signing_key),
            nonces,
            inspector,
            verifier,
            logger,
            metrics: ValidationMetrics::new(),
        }
    }

    /// Validator with default collaborators at `level`.
    pub fn with_level(level: SecurityLevel) -> Self {
        let settings = SecuritySettings {
            level,
            ..SecuritySettings::default()
        };
        Self::new(ValidatorOptions {
            settings,
            ..ValidatorOptions::default()
        })
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.level
    }

    /// Validate a received envelope.
    pub fn validate_message(&self, message: &Value) -> ValidationResult {
        let start = Instant::now();
        let mut details = ValidationDetails::default();

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_stages(message, &mut details)));

        let result = match outcome {
            Ok(Ok(())) => ValidationResult::accepted(details),
            Ok(Err(errors)) => ValidationResult::rejected(details, &errors),
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                self.logger
                    .log_validation_failed("validation-execution", &reason, Value::Null);
                ValidationResult::rejected(details, &[ValidationError::Internal(reason)])
            }
        };

        match result.error_kind {
            None => self.metrics.record_accepted(start.elapsed()),
            Some(kind) => self.metrics.record_rejected(kind, start.elapsed()),
        }
        result
    }

    fn run_stages(
        &self,
        message: &Value,
        details: &mut ValidationDetails,
    ) -> Result<(), Vec<ValidationError>> {
        // Stage 1: structure
        if let Err(errors) = self.inspector.validate_message_structure(message) {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            self.logger.log_validation_failed(
                "structure-validation",
                "Message structure validation failed",
                json!({ "errors": messages }),
            );
            return Err(errors);
        }
        details.structure_valid = true;

        // Stage 2: source
        let source = message.get("source");
        if let Err(e) = self.inspector.validate_source(source) {
            self.logger.log_validation_failed(
                "source-validation",
                &e.to_string(),
                json!({ "source": source }),
            );
            return Err(vec![e]);
        }
        details.source_valid = true;
        let source = str_field(message, "source").unwrap_or_default();

        // Stage 3: nonce freshness and single use
        if self.level.checks_nonce() {
            if let Err(e) = self.inspector.validate_nonce(message.get("nonce")) {
                self.logger
                    .log_validation_failed("nonce-format-validation", &e.to_string(), Value::Null);
                return Err(vec![e]);
            }

            let nonce = str_field(message, "nonce").unwrap_or_default();
            if !self.nonces.validate(nonce) {
                self.logger
                    .log_nonce_invalid("unknown or expired", json!({ "source": source }));
                return Err(vec![ValidationError::NonceInvalid]);
            }
            details.nonce_valid = true;
            self.logger
                .log_nonce_validated(nonce, json!({ "source": source }));
        }

        let message_type = str_field(message, "type").unwrap_or_default();

        // Stage 4: signature
        let key = self.signing_key.read().clone();
        if self.level.checks_signature(key.is_some()) {
            let signature_field = message.get("signature");
            if let Err(e) = self.inspector.validate_signature(signature_field) {
                self.logger.log_validation_failed(
                    "signature-format-validation",
                    &e.to_string(),
                    Value::Null,
                );
                return Err(vec![e]);
            }

            let Some(key) = key else {
                self.logger.log_validation_failed(
                    "signature-verification",
                    "No signing key available",
                    Value::Null,
                );
                return Err(vec![ValidationError::Configuration]);
            };

            let signature = str_field(message, "signature").unwrap_or_default();
            if !self.verifier.verify_signature(message, signature, Some(&key)) {
                self.logger.log_event(
                    EventType::SignatureMismatch,
                    LogLevel::Warn,
                    format!("Signature mismatch for message type {message_type}"),
                    json!({ "messageType": message_type, "source": source }),
                );
                self.logger.log_validation_failed(
                    "signature-verification",
                    "Invalid or tampered signature",
                    json!({ "messageType": message_type }),
                );
                return Err(vec![ValidationError::SignatureVerification]);
            }
            details.signature_valid = true;
            self.logger
                .log_message_validated(message_type, json!({ "source": source }));
        }

        // Stage 5: accept
        self.logger.log_event(
            EventType::MessageValidated,
            LogLevel::Info,
            format!("Message validated: {message_type}"),
            json!({
                "messageType": message_type,
                "source": source,
                "securityLevel": self.level,
            }),
        );
        Ok(())
    }

    /// Issue a nonce; failures are logged and returned.
    pub fn generate_nonce(&self) -> Result<String, NonceError> {
        match self.nonces.generate() {
            Ok(nonce) => {
                self.metrics.record_nonce_generated();
                self.logger.log_event(
                    EventType::NonceGenerated,
                    LogLevel::Debug,
                    format!("Generated nonce ({} chars, hex format)", nonce.len()),
                    json!({ "nonceLength": nonce.len(), "format": "hex" }),
                );
                Ok(nonce)
            }
            Err(e) => {
                self.metrics.record_nonce_generation_failed();
                self.logger.log_event(
                    EventType::NonceGenerationFailed,
                    LogLevel::Error,
                    format!("Nonce generation failed: {e}"),
                    json!({ "error": e.to_string() }),
                );
                Err(e)
            }
        }
    }

    /// Install the verification key. `None` is rejected and leaves the
    /// current key in place.
    pub fn set_signing_key(&self, key: Option<SigningKey>) -> bool {
        let Some(key) = key else {
            return false;
        };
        self.verifier.set_signing_key(Some(key.clone()));
        *self.signing_key.write() = Some(key);
        true
    }

    /// Remove the verification key. At `strict` every envelope is rejected
    /// until a new key is set.
    pub fn clear_signing_key(&self) {
        self.verifier.set_signing_key(None);
        *self.signing_key.write() = None;
    }

    pub fn has_signing_key(&self) -> bool {
        self.signing_key.read().is_some()
    }

    pub fn get_statistics(&self) -> ValidatorStatistics {
        ValidatorStatistics {
            security_level: self.level,
            nonce_manager: NonceStatistics {
                active_nonces: self.nonces.active_count(),
            },
            logger: self.logger.get_statistics(),
            metrics: self.metrics.snapshot(),
        }
    }

    pub fn get_config(&self) -> ValidatorConfig {
        let nonce = self.nonces.config();
        ValidatorConfig {
            security_level: self.level,
            has_signing_key: self.has_signing_key(),
            nonce_ttl_secs: nonce.ttl.as_secs(),
            nonce_cleanup_interval_secs: nonce.cleanup_interval.as_secs(),
            nonce_length: nonce.token_len(),
            message_validation: self.inspector.rules(),
            message_signer: self.verifier.algorithm(),
        }
    }

    pub fn get_logs(&self, event_type: Option<EventType>) -> Vec<SecurityLogEntry> {
        match event_type {
            Some(event_type) => self.logger.get_logs_by_event_type(event_type),
            None => self.logger.get_logs(),
        }
    }

    pub fn clear_logs(&self) {
        self.logger.clear_logs();
    }

    pub fn logger(&self) -> &Arc<SecurityLogger> {
        &self.logger
    }

    pub fn metrics(&self) -> &ValidationMetrics {
        &self.metrics
    }

    pub fn settings(&self) -> &SecuritySettings {
        &self.settings
    }

    /// Cancel the nonce expiry sweep.
    pub fn shutdown(&self) {
        self.nonces.stop_cleanup();
    }
}

impl Default for CrossWorldValidator {
    fn default() -> Self {
        Self::new(ValidatorOptions::default())
    }
}

impl std::fmt::Debug for CrossWorldValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossWorldValidator")
            .field("level", &self.level)
            .field("has_signing_key", &self.has_signing_key())
            .field("active_nonces", &self.nonces.active_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageAuthenticationApi for CrossWorldValidator {
    async fn validate(&self, message: &Value) -> ValidationResult {
        self.validate_message(message)
    }

    async fn issue_nonce(&self) -> Result<String, NonceError> {
        self.generate_nonce()
    }

    fn set_signing_key(&self, key: Option<SigningKey>) -> bool {
        CrossWorldValidator::set_signing_key(self, key)
    }

    fn statistics(&self) -> ValidatorStatistics {
        self.get_statistics()
    }

    fn config(&self) -> ValidatorConfig {
        self.get_config()
    }

    fn logs(&self, event_type: Option<EventType>) -> Vec<SecurityLogEntry> {
        self.get_logs(event_type)
    }

    fn clear_logs(&self) {
        CrossWorldValidator::clear_logs(self)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}
