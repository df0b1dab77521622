//! # Message Signer
//!
//! Keyed-hash signing and verification of cross-world envelopes.
//!
//! ## Security Properties
//!
//! - **Key derivation**: PBKDF2-HMAC-SHA256, at least 100,000 iterations,
//!   over a caller secret and an explicit or default salt
//! - **Signatures**: HMAC-SHA256 over a canonical byte form, hex-encoded
//! - **Verification**: constant-time tag comparison
//!
//! ## Canonical Form
//!
//! The signed bytes are the compact JSON serialization of the message with
//! object keys sorted at every depth and the top-level `signature` member
//! removed. Signing is therefore a pure function of (content, key), and a
//! signature can be attached to the envelope it covers without changing the
//! content it covers.

use crate::domain::config::{SignerConfig, MIN_KDF_ITERATIONS};
use crate::domain::envelope::{Envelope, SIGNATURE_FIELD};
use crate::domain::errors::SignerError;
use crate::ports::outbound::SignatureVerifier;
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Derived key length in bytes (SHA-256 output size).
pub const KEY_LENGTH: usize = 32;

// =============================================================================
// SIGNING KEY
// =============================================================================

/// Opaque HMAC key derived from a secret.
///
/// The raw bytes never leave this type: there is no accessor, no
/// `Serialize`, and `Debug` prints a placeholder. Bytes are wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    bytes: [u8; KEY_LENGTH],
}

impl SigningKey {
    /// Derive a key with PBKDF2-HMAC-SHA256.
    ///
    /// # Errors
    ///
    /// - `SignerError::EmptySecret` if `secret` is empty
    /// - `SignerError::WeakIterations` if `iterations` is below the minimum
    pub fn derive(secret: &str, salt: &[u8], iterations: u32) -> Result<Self, SignerError> {
        if secret.is_empty() {
            return Err(SignerError::EmptySecret);
        }
        if iterations < MIN_KDF_ITERATIONS {
            return Err(SignerError::WeakIterations {
                requested: iterations,
                minimum: MIN_KDF_ITERATIONS,
            });
        }

        let mut bytes = [0u8; KEY_LENGTH];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, iterations, &mut bytes);
        Ok(Self { bytes })
    }

    fn mac(&self) -> Result<HmacSha256, SignerError> {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.bytes).map_err(|e| SignerError::Key(e.to_string()))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Algorithm parameters, for diagnostics and statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmInfo {
    pub name: &'static str,
    pub hash: &'static str,
    pub key_derivation: &'static str,
    pub key_derivation_iterations: u32,
    pub signature_encoding: &'static str,
}

// =============================================================================
// MESSAGE SIGNER
// =============================================================================

/// Signs and verifies envelopes, optionally holding a default key.
#[derive(Debug, Default)]
pub struct MessageSigner {
    key: RwLock<Option<SigningKey>>,
    config: SignerConfig,
}

impl MessageSigner {
    /// Create a signer with default settings and no key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signer with custom key derivation settings.
    pub fn with_config(config: SignerConfig) -> Self {
        Self {
            key: RwLock::new(None),
            config,
        }
    }

    /// Derive a key from `secret`, using the configured default salt when
    /// `salt` is `None`.
    pub fn generate_signing_key(
        &self,
        secret: &str,
        salt: Option<&[u8]>,
    ) -> Result<SigningKey, SignerError> {
        let salt = salt.unwrap_or(&self.config.default_salt);
        SigningKey::derive(secret, salt, self.config.iterations)
    }

    /// Sign `message` with `key`, or with the instance key when `key` is `None`.
    ///
    /// # Errors
    ///
    /// - `SignerError::InvalidMessage` if `message` is not an object or array
    /// - `SignerError::MissingKey` if no key was passed and none is set
    pub fn sign_message(
        &self,
        message: &Value,
        key: Option<&SigningKey>,
    ) -> Result<String, SignerError> {
        let bytes = canonical_bytes(message)?;
        let tag = match key {
            Some(key) => compute_tag(key, &bytes)?,
            None => {
                let guard = self.key.read();
                let key = guard.as_ref().ok_or(SignerError::MissingKey)?;
                compute_tag(key, &bytes)?
            }
        };
        Ok(hex::encode(tag))
    }

    /// Sign an envelope and return it with the signature attached.
    pub fn sign_envelope(
        &self,
        envelope: Envelope,
        key: Option<&SigningKey>,
    ) -> Result<Envelope, SignerError> {
        let signature = self.sign_message(&envelope.to_value(), key)?;
        Ok(envelope.with_signature(signature))
    }

    /// Check `signature` against `message` under `key` or the instance key.
    ///
    /// Returns `false` on any failure: no key, a non-hex or wrong-length
    /// signature, an unsignable message, or a mismatch.
    pub fn verify_signature(
        &self,
        message: &Value,
        signature: &str,
        key: Option<&SigningKey>,
    ) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(bytes) = canonical_bytes(message) else {
            return false;
        };

        let guard;
        let key = match key {
            Some(key) => key,
            None => {
                guard = self.key.read();
                match guard.as_ref() {
                    Some(key) => key,
                    None => return false,
                }
            }
        };

        let Ok(mut mac) = key.mac() else {
            return false;
        };
        mac.update(&bytes);
        mac.verify_slice(&expected).is_ok()
    }

    /// Install or clear the instance key. Returns whether a key is now set.
    pub fn set_signing_key(&self, key: Option<SigningKey>) -> bool {
        let mut slot = self.key.write();
        *slot = key;
        slot.is_some()
    }

    /// Returns true if an instance key is set.
    pub fn has_key(&self) -> bool {
        self.key.read().is_some()
    }

    pub fn algorithm(&self) -> AlgorithmInfo {
        AlgorithmInfo {
            name: "HMAC",
            hash: "SHA-256",
            key_derivation: "PBKDF2",
            key_derivation_iterations: self.config.iterations,
            signature_encoding: "hex",
        }
    }
}

impl SignatureVerifier for MessageSigner {
    fn verify_signature(
        &self,
        message: &Value,
        signature: &str,
        key: Option<&SigningKey>,
    ) -> bool {
        MessageSigner::verify_signature(self, message, signature, key)
    }

    fn set_signing_key(&self, key: Option<SigningKey>) -> bool {
        MessageSigner::set_signing_key(self, key)
    }

    fn algorithm(&self) -> AlgorithmInfo {
        MessageSigner::algorithm(self)
    }
}

// =============================================================================
// CANONICAL FORM
// =============================================================================

/// Bytes covered by a signature over `message`.
pub fn canonical_bytes(message: &Value) -> Result<Vec<u8>, SignerError> {
    let content = match message {
        Value::Object(obj) => {
            let mut unsigned = obj.clone();
            unsigned.remove(SIGNATURE_FIELD);
            canonicalize(&Value::Object(unsigned))
        }
        Value::Array(_) => canonicalize(message),
        _ => return Err(SignerError::InvalidMessage),
    };

    serde_json::to_vec(&content).map_err(|e| SignerError::Serialization(e.to_string()))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(obj.len());
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&obj[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn compute_tag(key: &SigningKey, bytes: &[u8]) -> Result<Vec<u8>, SignerError> {
    let mut mac = key.mac()?;
    mac.update(bytes);
    Ok(mac.finalize().into_bytes().to_vec())
}
