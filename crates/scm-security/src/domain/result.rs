//! Outcome and introspection types returned by the cross-world validator.

use crate::domain::config::SecurityLevel;
use crate::domain::errors::{ValidationError, ValidationErrorKind};
use crate::domain::signer::AlgorithmInfo;
use crate::domain::validator::ValidatorRules;
use crate::logging::LogStatistics;
use crate::metrics::MetricsSnapshot;
use serde::Serialize;

/// Which pipeline stages passed.
///
/// Stages that did not run (skipped by level or after an earlier failure)
/// stay `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationDetails {
    pub structure_valid: bool,
    pub source_valid: bool,
    pub nonce_valid: bool,
    pub signature_valid: bool,
}

/// Result of validating one envelope.
///
/// `valid` is true exactly when `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub details: ValidationDetails,
    /// Kind of the first error, if rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ValidationErrorKind>,
}

impl ValidationResult {
    pub fn accepted(details: ValidationDetails) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            details,
            error_kind: None,
        }
    }

    pub fn rejected(details: ValidationDetails, errors: &[ValidationError]) -> Self {
        let error_kind = errors
            .first()
            .map(ValidationError::kind)
            .or(Some(ValidationErrorKind::Internal));
        let mut messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        if messages.is_empty() {
            let fallback = ValidationError::Internal("rejected without a reason".into());
            messages.push(fallback.to_string());
        }
        Self {
            valid: false,
            errors: messages,
            details,
            error_kind,
        }
    }

    /// True if any error message contains `needle`, ignoring ASCII case.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.errors
            .iter()
            .any(|e| e.to_ascii_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceStatistics {
    pub active_nonces: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorStatistics {
    pub security_level: SecurityLevel,
    pub nonce_manager: NonceStatistics,
    pub logger: LogStatistics,
    pub metrics: MetricsSnapshot,
}

/// Effective configuration. Never includes key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorConfig {
    pub security_level: SecurityLevel,
    pub has_signing_key: bool,
    pub nonce_ttl_secs: u64,
    pub nonce_cleanup_interval_secs: u64,
    pub nonce_length: usize,
    pub message_validation: ValidatorRules,
    pub message_signer: AlgorithmInfo,
}
