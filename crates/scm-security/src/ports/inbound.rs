//! # Inbound Ports (Driving Ports / API)
//!
//! The API the transport glue calls when an envelope arrives or a sender
//! needs a nonce. Implementations must be thread-safe (`Send + Sync`).

use crate::domain::errors::NonceError;
use crate::domain::result::{ValidationResult, ValidatorConfig, ValidatorStatistics};
use crate::domain::signer::SigningKey;
use crate::logging::{EventType, SecurityLogEntry};
use async_trait::async_trait;
use serde_json::Value;

/// Cross-world message authentication API.
#[async_trait]
pub trait MessageAuthenticationApi: Send + Sync {
    // =========================================================================
    // Validation
    // =========================================================================

    /// Run the validation pipeline on a received envelope. Never fails; every
    /// rejection is described in the result.
    async fn validate(&self, message: &Value) -> ValidationResult;

    /// Issue a nonce for a sender to embed in its next envelope.
    async fn issue_nonce(&self) -> Result<String, NonceError>;

    // =========================================================================
    // Key Management
    // =========================================================================

    /// Install the verification key. Returns `false` and changes nothing
    /// when `key` is `None`.
    fn set_signing_key(&self, key: Option<SigningKey>) -> bool;

    // =========================================================================
    // Introspection
    // =========================================================================

    fn statistics(&self) -> ValidatorStatistics;

    fn config(&self) -> ValidatorConfig;

    /// Buffered security log entries, optionally of one event type.
    fn logs(&self, event_type: Option<EventType>) -> Vec<SecurityLogEntry>;

    fn clear_logs(&self);
}
