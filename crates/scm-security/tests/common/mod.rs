//! Shared helpers for integration tests.

#![allow(dead_code)]

use scm_security::{CrossWorldValidator, MessageSigner, SecurityLevel, SigningKey, ValidatorOptions};
use serde_json::{json, Value};
use std::sync::OnceLock;

/// Key derived from secret "abc" with the default salt.
pub fn key_abc() -> &'static SigningKey {
    static KEY: OnceLock<SigningKey> = OnceLock::new();
    KEY.get_or_init(|| {
        MessageSigner::new()
            .generate_signing_key("abc", None)
            .expect("derive key")
    })
}

/// Key derived from secret "other" with the default salt.
pub fn key_other() -> &'static SigningKey {
    static KEY: OnceLock<SigningKey> = OnceLock::new();
    KEY.get_or_init(|| {
        MessageSigner::new()
            .generate_signing_key("other", None)
            .expect("derive key")
    })
}

pub fn unsigned(message_type: &str, nonce: &str) -> Value {
    json!({
        "type": message_type,
        "payload": {"ready": true},
        "source": "scm-x",
        "nonce": nonce,
        "signature": ""
    })
}

pub fn sign(mut message: Value, key: &SigningKey) -> Value {
    let signature = MessageSigner::new()
        .sign_message(&message, Some(key))
        .expect("sign");
    message["signature"] = Value::String(signature);
    message
}

pub fn validator(level: SecurityLevel, key: Option<&SigningKey>) -> CrossWorldValidator {
    let mut builder = ValidatorOptions::builder().security_level(level);
    if let Some(key) = key {
        builder = builder.signing_key(key.clone());
    }
    CrossWorldValidator::new(builder.build().expect("options"))
}

/// Flip one hex digit of a signature.
pub fn flip_hex_char(signature: &str, index: usize) -> String {
    let mut chars: Vec<char> = signature.chars().collect();
    chars[index] = if chars[index] == '0' { '1' } else { '0' };
    chars.into_iter().collect()
}
