//! # Domain Layer
//!
//! Core security components. No transport, no I/O.

pub mod config;
pub mod envelope;
pub mod errors;
pub mod nonce;
pub mod result;
pub mod signer;
pub mod validator;

pub use config::*;
pub use envelope::*;
pub use errors::*;
pub use nonce::NonceManager;
pub use result::*;
pub use signer::{canonical_bytes, AlgorithmInfo, MessageSigner, SigningKey, KEY_LENGTH};
pub use validator::{CheckReport, MessageValidator, ValidationCode, ValidatorRules, NONCE_HEX_LEN};
