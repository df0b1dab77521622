//! Validation counters.
//!
//! Thread-safe counters over `validate_message` outcomes, with a rejection
//! count per pipeline stage.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = ValidationMetrics::new();
//! let start = std::time::Instant::now();
//! metrics.record_accepted(start.elapsed());
//! assert_eq!(metrics.snapshot().accepted, 1);
//! ```

use crate::domain::errors::ValidationErrorKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ValidationMetrics {
    /// Total envelopes presented
    pub validations: AtomicU64,
    /// Envelopes that passed every required stage
    pub accepted: AtomicU64,
    pub rejected_structure: AtomicU64,
    /// Only reachable through an injected inspector that gates on type
    pub rejected_message_type: AtomicU64,
    pub rejected_source: AtomicU64,
    pub rejected_nonce: AtomicU64,
    pub rejected_signature: AtomicU64,
    /// Missing key at a level that requires one
    pub rejected_configuration: AtomicU64,
    /// Stage panicked or otherwise failed unexpectedly
    pub internal_errors: AtomicU64,
    /// Cumulative pipeline time in nanoseconds
    pub validation_time_ns: AtomicU64,
    pub nonces_generated: AtomicU64,
    pub nonce_generation_failures: AtomicU64,
}

impl ValidationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self, duration: Duration) {
        self.validations.fetch_add(1, Ordering::Relaxed);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.add_time(duration);
    }

    /// Record a rejection attributed to the stage that produced `kind`.
    pub fn record_rejected(&self, kind: ValidationErrorKind, duration: Duration) {
        self.validations.fetch_add(1, Ordering::Relaxed);
        self.add_time(duration);

        let counter = match kind {
            ValidationErrorKind::Structure => &self.rejected_structure,
            ValidationErrorKind::MessageType => &self.rejected_message_type,
            ValidationErrorKind::Source => &self.rejected_source,
            ValidationErrorKind::NonceFormat | ValidationErrorKind::NonceInvalid => {
                &self.rejected_nonce
            }
            ValidationErrorKind::SignatureFormat | ValidationErrorKind::SignatureVerification => {
                &self.rejected_signature
            }
            ValidationErrorKind::Configuration => &self.rejected_configuration,
            ValidationErrorKind::Internal => &self.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nonce_generated(&self) {
        self.nonces_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nonce_generation_failed(&self) {
        self.nonce_generation_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn add_time(&self, duration: Duration) {
        self.validation_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn avg_validation_time_ns(&self) -> u64 {
        let total = self.validation_time_ns.load(Ordering::Relaxed);
        let count = self.validations.load(Ordering::Relaxed);
        if count > 0 {
            total / count
        } else {
            0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validations: self.validations.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_structure: self.rejected_structure.load(Ordering::Relaxed),
            rejected_message_type: self.rejected_message_type.load(Ordering::Relaxed),
            rejected_source: self.rejected_source.load(Ordering::Relaxed),
            rejected_nonce: self.rejected_nonce.load(Ordering::Relaxed),
            rejected_signature: self.rejected_signature.load(Ordering::Relaxed),
            rejected_configuration: self.rejected_configuration.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
            avg_validation_ns: self.avg_validation_time_ns(),
            nonces_generated: self.nonces_generated.load(Ordering::Relaxed),
            nonce_generation_failures: self.nonce_generation_failures.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.validations.store(0, Ordering::Relaxed);
        self.accepted.store(0, Ordering::Relaxed);
        self.rejected_structure.store(0, Ordering::Relaxed);
        self.rejected_message_type.store(0, Ordering::Relaxed);
        self.rejected_source.store(0, Ordering::Relaxed);
        self.rejected_nonce.store(0, Ordering::Relaxed);
        self.rejected_signature.store(0, Ordering::Relaxed);
        self.rejected_configuration.store(0, Ordering::Relaxed);
        self.internal_errors.store(0, Ordering::Relaxed);
        self.validation_time_ns.store(0, Ordering::Relaxed);
        self.nonces_generated.store(0, Ordering::Relaxed);
        self.nonce_generation_failures.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub validations: u64,
    pub accepted: u64,
    pub rejected_structure: u64,
    pub rejected_message_type: u64,
    pub rejected_source: u64,
    pub rejected_nonce: u64,
    pub rejected_signature: u64,
    pub rejected_configuration: u64,
    pub internal_errors: u64,
    pub avg_validation_ns: u64,
    pub nonces_generated: u64,
    pub nonce_generation_failures: u64,
}

impl MetricsSnapshot {
    pub fn rejected(&self) -> u64 {
        self.validations - self.accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_stage() {
        let metrics = ValidationMetrics::new();
        metrics.record_accepted(Duration::from_micros(10));
        metrics.record_rejected(ValidationErrorKind::NonceInvalid, Duration::from_micros(20));
        metrics.record_rejected(ValidationErrorKind::NonceFormat, Duration::from_micros(30));
        metrics.record_rejected(ValidationErrorKind::Configuration, Duration::ZERO);

        let snap = metrics.snapshot();
        assert_eq!(snap.validations, 4);
        assert_eq!(snap.accepted, 1);
        assert_eq!(snap.rejected(), 3);
        assert_eq!(snap.rejected_nonce, 2);
        assert_eq!(snap.rejected_configuration, 1);
        assert_eq!(snap.avg_validation_ns, 15_000);
    }

    #[test]
    fn test_message_type_counted_apart_from_structure() {
        let metrics = ValidationMetrics::new();
        metrics.record_rejected(ValidationErrorKind::MessageType, Duration::ZERO);
        metrics.record_rejected(ValidationErrorKind::Structure, Duration::ZERO);

        let snap = metrics.snapshot();
        assert_eq!(snap.rejected_message_type, 1);
        assert_eq!(snap.rejected_structure, 1);
        assert_eq!(snap.rejected(), 2);
    }

    #[test]
    fn test_reset() {
        let metrics = ValidationMetrics::new();
        metrics.record_rejected(ValidationErrorKind::Internal, Duration::from_millis(1));
        metrics.record_nonce_generated();
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
