//! # Outbound Ports (Driven Ports / SPI)
//!
//! Collaborators the cross-world validator depends on. Each has a default
//! implementation in the domain layer and can be replaced independently,
//! which is how tests substitute failing or instrumented components.

use crate::domain::config::NonceConfig;
use crate::domain::errors::{NonceError, ValidationError};
use crate::domain::signer::{AlgorithmInfo, SigningKey};
use crate::domain::validator::ValidatorRules;
use rand::RngCore;
use serde_json::Value;

/// Source of cryptographically secure random bytes.
pub trait EntropySource: Send + Sync {
    /// Fill `buf` completely or fail. Implementations MUST NOT fall back to a
    /// non-cryptographic generator.
    fn fill(&self, buf: &mut [u8]) -> Result<(), NonceError>;
}

/// Operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), NonceError> {
        rand::rngs::OsRng
            .try_fill_bytes(buf)
            .map_err(|e| NonceError::EntropyUnavailable(e.to_string()))
    }
}

/// Issues one-time nonces and enforces freshness and single use.
pub trait NonceAuthority: Send + Sync {
    /// Issue a fresh nonce.
    fn generate(&self) -> Result<String, NonceError>;

    /// Consume a nonce. Returns `true` at most once per issued nonce and
    /// never for an expired or unknown one.
    fn validate(&self, nonce: &str) -> bool;

    /// Number of issued, not yet consumed or swept nonces.
    fn active_count(&self) -> usize;

    /// Settings in effect.
    fn config(&self) -> NonceConfig;

    /// Schedule the periodic expiry sweep.
    fn start_cleanup(&self) -> Result<(), NonceError> {
        Ok(())
    }

    /// Cancel the periodic expiry sweep.
    fn stop_cleanup(&self) {}
}

/// Stateless structural checks on a wire envelope.
pub trait EnvelopeInspector: Send + Sync {
    fn validate_message_structure(&self, message: &Value) -> Result<(), Vec<ValidationError>>;

    fn validate_source(&self, source: Option<&Value>) -> Result<(), ValidationError>;

    fn validate_nonce(&self, nonce: Option<&Value>) -> Result<(), ValidationError>;

    fn validate_signature(&self, signature: Option<&Value>) -> Result<(), ValidationError>;

    fn validate_message_type(&self, message_type: Option<&Value>) -> Result<(), ValidationError>;

    /// Accepted source prefix and message types.
    fn rules(&self) -> ValidatorRules;
}

/// Keyed-hash verification of envelopes.
pub trait SignatureVerifier: Send + Sync {
    /// Recompute the signature of `message` under `key` (or the verifier's own
    /// key) and compare it with `signature`. Never panics on malformed input.
    fn verify_signature(&self, message: &Value, signature: &str, key: Option<&SigningKey>)
        -> bool;

    /// Install the verifier's default key.
    fn set_signing_key(&self, key: Option<SigningKey>) -> bool;

    /// Algorithm parameters, for reporting.
    fn algorithm(&self) -> AlgorithmInfo;
}
