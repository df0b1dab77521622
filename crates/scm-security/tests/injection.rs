//! # Collaborator Injection Tests
//!
//! Every collaborator of the validator can be replaced. These tests inject
//! failing, panicking and instrumented components and check that
//! `validate_message` still returns a result.

mod common;

use common::{key_abc, sign, unsigned};
use scm_security::{
    AlgorithmInfo, CaptureSink, CrossWorldValidator, EntropySource, EnvelopeInspector, EventType,
    LogLevel, LoggerConfig, MessageSigner, MessageValidator, NonceAuthority, NonceConfig,
    NonceError, NonceManager, SecurityLevel, SecurityLogger, SignatureVerifier, SigningKey,
    SinkRouter, ValidationError, ValidationErrorKind, ValidatorOptions, ValidatorRules,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// =============================================================================
// TEST DOUBLES
// =============================================================================

struct NoEntropy;

impl EntropySource for NoEntropy {
    fn fill(&self, _buf: &mut [u8]) -> Result<(), NonceError> {
        Err(NonceError::EntropyUnavailable("device missing".into()))
    }
}

/// Accepts every nonce and counts lookups.
#[derive(Default)]
struct CountingNonces {
    lookups: AtomicUsize,
}

impl NonceAuthority for CountingNonces {
    fn generate(&self) -> Result<String, NonceError> {
        Ok("0".repeat(32))
    }

    fn validate(&self, _nonce: &str) -> bool {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn active_count(&self) -> usize {
        0
    }

    fn config(&self) -> NonceConfig {
        NonceConfig::default()
    }
}

struct PanickingNonces;

impl NonceAuthority for PanickingNonces {
    fn generate(&self) -> Result<String, NonceError> {
        Ok("0".repeat(32))
    }

    fn validate(&self, _nonce: &str) -> bool {
        panic!("nonce store corrupted");
    }

    fn active_count(&self) -> usize {
        0
    }

    fn config(&self) -> NonceConfig {
        NonceConfig::default()
    }
}

/// Delegates to the real validator but fails structure for a marker payload.
struct StrictInspector(MessageValidator);

impl EnvelopeInspector for StrictInspector {
    fn validate_message_structure(&self, message: &Value) -> Result<(), Vec<ValidationError>> {
        self.0.validate_message_structure(message)?;
        if message["payload"].get("forbidden").is_some() {
            return Err(vec![ValidationError::Structure("forbidden payload".into())]);
        }
        Ok(())
    }

    fn validate_source(&self, source: Option<&Value>) -> Result<(), ValidationError> {
        self.0.validate_source(source)
    }

    fn validate_nonce(&self, nonce: Option<&Value>) -> Result<(), ValidationError> {
        self.0.validate_nonce(nonce)
    }

    fn validate_signature(&self, signature: Option<&Value>) -> Result<(), ValidationError> {
        self.0.validate_signature(signature)
    }

    fn validate_message_type(&self, message_type: Option<&Value>) -> Result<(), ValidationError> {
        self.0.validate_message_type(message_type)
    }

    fn rules(&self) -> ValidatorRules {
        self.0.rules().clone()
    }
}

/// Records whether it was consulted and always rejects.
#[derive(Default)]
struct RejectingVerifier {
    calls: AtomicUsize,
}

impl SignatureVerifier for RejectingVerifier {
    fn verify_signature(
        &self,
        _message: &Value,
        _signature: &str,
        _key: Option<&SigningKey>,
    ) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }

    fn set_signing_key(&self, key: Option<SigningKey>) -> bool {
        key.is_some()
    }

    fn algorithm(&self) -> AlgorithmInfo {
        MessageSigner::new().algorithm()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[test]
fn test_failing_entropy_fails_generation_and_logs() {
    let nonces = Arc::new(NonceManager::with_entropy(NonceConfig::default(), Arc::new(NoEntropy)));
    let validator = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .nonce_manager(nonces)
            .build()
            .unwrap(),
    );

    let err = validator.generate_nonce().unwrap_err();
    assert!(matches!(err, NonceError::EntropyUnavailable(_)));

    let logs = validator.get_logs(Some(EventType::NonceGenerationFailed));
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Error);
}

#[test]
fn test_panicking_collaborator_becomes_internal_error() {
    let validator = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .security_level(SecurityLevel::Moderate)
            .nonce_manager(Arc::new(PanickingNonces))
            .build()
            .unwrap(),
    );

    let result = validator.validate_message(&unsigned("ready", &"0".repeat(32)));
    assert!(!result.valid);
    assert_eq!(result.error_kind, Some(ValidationErrorKind::Internal));
    assert!(result.errors[0].contains("nonce store corrupted"));
    assert!(result.details.structure_valid);
    assert!(result.details.source_valid);
    assert!(!result.details.nonce_valid);
    assert_eq!(validator.get_statistics().metrics.internal_errors, 1);
}

#[test]
fn test_injected_nonce_authority_is_consulted() {
    let nonces = Arc::new(CountingNonces::default());
    let validator = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .security_level(SecurityLevel::Moderate)
            .nonce_manager(nonces.clone())
            .build()
            .unwrap(),
    );

    assert!(validator.validate_message(&unsigned("ready", &"1".repeat(32))).valid);
    assert!(validator.validate_message(&unsigned("ready", &"1".repeat(32))).valid);
    assert_eq!(nonces.lookups.load(Ordering::SeqCst), 2);
}

#[test]
fn test_basic_never_consults_nonce_authority() {
    let nonces = Arc::new(CountingNonces::default());
    let validator = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .security_level(SecurityLevel::Basic)
            .nonce_manager(nonces.clone())
            .build()
            .unwrap(),
    );

    assert!(validator.validate_message(&unsigned("ready", "zzz")).valid);
    assert_eq!(nonces.lookups.load(Ordering::SeqCst), 0);
}

#[test]
fn test_injected_inspector_is_used() {
    let validator = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .security_level(SecurityLevel::Basic)
            .message_validator(Arc::new(StrictInspector(MessageValidator::new())))
            .build()
            .unwrap(),
    );

    let mut message = unsigned("ready", "x");
    message["payload"]["forbidden"] = Value::Bool(true);
    let result = validator.validate_message(&message);
    assert!(!result.valid);
    assert_eq!(result.errors, vec!["forbidden payload".to_string()]);
}

#[test]
fn test_injected_verifier_overrides_crypto() {
    let verifier = Arc::new(RejectingVerifier::default());
    let validator = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .signing_key(key_abc().clone())
            .message_signer(verifier.clone())
            .build()
            .unwrap(),
    );

    let nonce = validator.generate_nonce().unwrap();
    let result = validator.validate_message(&sign(unsigned("ready", &nonce), key_abc()));
    assert!(!result.valid);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        result.error_kind,
        Some(ValidationErrorKind::SignatureVerification)
    );
}

#[test]
fn test_shared_logger_and_sink_routing() {
    let errors = Arc::new(CaptureSink::new());
    let everything = Arc::new(CaptureSink::new());
    let logger = Arc::new(SecurityLogger::with_sinks(
        LoggerConfig::default(),
        SinkRouter::uniform(everything.clone()).with_level(LogLevel::Error, errors.clone()),
    ));

    let validator = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .security_level(SecurityLevel::Moderate)
            .security_logger(logger.clone())
            .build()
            .unwrap(),
    );

    let nonce = validator.generate_nonce().unwrap();
    assert!(validator.validate_message(&unsigned("ready", &nonce)).valid);
    assert!(!validator.validate_message(&unsigned("ready", &nonce)).valid);

    // A replay is logged at WARN only.
    assert!(errors.is_empty());
    assert!(everything
        .entries()
        .iter()
        .any(|e| e.event_type == EventType::NonceInvalid));
    assert_eq!(logger.size(), validator.get_logs(None).len());
}

#[test]
fn test_debug_entries_reach_sinks_only_in_debug_mode() {
    let sink = Arc::new(CaptureSink::new());
    let logger = Arc::new(SecurityLogger::with_sinks(
        LoggerConfig::default(),
        SinkRouter::uniform(sink.clone()),
    ));
    let validator = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .security_logger(logger.clone())
            .build()
            .unwrap(),
    );

    validator.generate_nonce().unwrap();
    assert!(sink.is_empty());
    assert_eq!(validator.get_logs(Some(EventType::NonceGenerated)).len(), 1);

    logger.set_debug_mode(true);
    validator.generate_nonce().unwrap();
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.entries()[0].level, LogLevel::Debug);
}

#[test]
fn test_nonce_generation_counted() {
    let failing = CrossWorldValidator::new(
        ValidatorOptions::builder()
            .nonce_manager(Arc::new(NonceManager::with_entropy(
                NonceConfig::default(),
                Arc::new(NoEntropy),
            )))
            .build()
            .unwrap(),
    );
    assert!(failing.generate_nonce().is_err());

    let working = CrossWorldValidator::default();
    working.generate_nonce().unwrap();
    working.generate_nonce().unwrap();

    assert_eq!(failing.get_statistics().metrics.nonce_generation_failures, 1);
    assert_eq!(failing.get_statistics().metrics.nonces_generated, 0);
    assert_eq!(working.get_statistics().metrics.nonces_generated, 2);
}
