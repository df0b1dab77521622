//! Security configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use scm_security::domain::config::{SecurityLevel, SecuritySettings};
//!
//! let settings = SecuritySettings::from_env()?;
//! assert_eq!(settings.level, SecurityLevel::Strict);
//! ```

use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Minimum PBKDF2 iteration count accepted for key derivation.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Salt used when the caller does not supply one (bytes 0..=15).
pub const DEFAULT_SALT: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// How much of the pipeline must pass for an envelope to be accepted.
///
/// | Level | Structure+Source | Nonce | Signature |
/// |---|---|---|---|
/// | basic | required | skipped | skipped |
/// | moderate | required | required | only if a key is configured |
/// | strict | required | required | mandatory |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Basic,
    Moderate,
    #[default]
    Strict,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Basic => "basic",
            SecurityLevel::Moderate => "moderate",
            SecurityLevel::Strict => "strict",
        }
    }

    /// Whether nonce freshness and replay checks run at this level.
    pub fn checks_nonce(&self) -> bool {
        !matches!(self, SecurityLevel::Basic)
    }

    /// Whether the signature stage runs, given whether a key is configured.
    pub fn checks_signature(&self, has_key: bool) -> bool {
        match self {
            SecurityLevel::Strict => true,
            SecurityLevel::Moderate => has_key,
            SecurityLevel::Basic => false,
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(SecurityLevel::Basic),
            "moderate" => Ok(SecurityLevel::Moderate),
            "strict" => Ok(SecurityLevel::Strict),
            other => Err(ConfigError::InvalidSecurityLevel(other.to_string())),
        }
    }
}

/// Nonce lifetime and sweep settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceConfig {
    /// Random bytes per nonce (hex-encoded to twice as many characters).
    pub nonce_length_bytes: usize,
    /// Time-to-live of an issued nonce.
    pub ttl: Duration,
    /// Period of the background expiry sweep.
    pub cleanup_interval: Duration,
}

impl NonceConfig {
    pub const DEFAULT_LENGTH_BYTES: usize = 16;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Number of hex characters in a nonce.
    pub fn token_len(&self) -> usize {
        self.nonce_length_bytes * 2
    }
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            nonce_length_bytes: Self::DEFAULT_LENGTH_BYTES,
            ttl: Self::DEFAULT_TTL,
            cleanup_interval: Self::DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

/// Key derivation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    /// PBKDF2-HMAC-SHA256 iteration count.
    pub iterations: u32,
    /// Salt applied when `generate_signing_key` gets none.
    pub default_salt: Vec<u8>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            iterations: MIN_KDF_ITERATIONS,
            default_salt: DEFAULT_SALT.to_vec(),
        }
    }
}

/// Security log buffer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Maximum buffered entries; the oldest is evicted first.
    pub capacity: usize,
    /// Forward DEBUG entries to the debug sink.
    pub debug_mode: bool,
}

impl LoggerConfig {
    pub const DEFAULT_CAPACITY: usize = 200;
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            debug_mode: false,
        }
    }
}

/// All tunables of the security layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecuritySettings {
    pub level: SecurityLevel,
    pub nonce: NonceConfig,
    pub signer: SignerConfig,
    pub logger: LoggerConfig,
}

impl SecuritySettings {
    /// Create settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SCM_SECURITY_LEVEL`: basic, moderate or strict (default: strict)
    /// - `SCM_NONCE_TTL_SECS`: nonce time-to-live (default: 300)
    /// - `SCM_NONCE_CLEANUP_SECS`: expiry sweep period (default: 60)
    /// - `SCM_LOG_CAPACITY`: security log capacity (default: 200)
    /// - `SCM_SECURITY_DEBUG`: forward DEBUG entries (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Ok(level) = env::var("SCM_SECURITY_LEVEL") {
            settings.level = level.parse()?;
        }
        if let Some(secs) = parse_env::<u64>("SCM_NONCE_TTL_SECS")? {
            settings.nonce.ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env::<u64>("SCM_NONCE_CLEANUP_SECS")? {
            settings.nonce.cleanup_interval = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse_env::<usize>("SCM_LOG_CAPACITY")? {
            settings.logger.capacity = capacity;
        }
        if let Ok(debug) = env::var("SCM_SECURITY_DEBUG") {
            settings.logger.debug_mode = debug.to_lowercase() == "true" || debug == "1";
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would disable a protection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nonce.ttl.is_zero() {
            return Err(invalid("nonce.ttl", "0"));
        }
        if self.nonce.cleanup_interval.is_zero() {
            return Err(invalid("nonce.cleanup_interval", "0"));
        }
        if self.nonce.nonce_length_bytes == 0 {
            return Err(invalid("nonce.nonce_length_bytes", "0"));
        }
        if self.signer.iterations < MIN_KDF_ITERATIONS {
            return Err(invalid("signer.iterations", &self.signer.iterations.to_string()));
        }
        if self.logger.capacity == 0 {
            return Err(invalid("logger.capacity", "0"));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(key, &raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = SecuritySettings::default();
        assert_eq!(settings.level, SecurityLevel::Strict);
        assert_eq!(settings.nonce.ttl, Duration::from_secs(300));
        assert_eq!(settings.nonce.cleanup_interval, Duration::from_secs(60));
        assert_eq!(settings.nonce.token_len(), 32);
        assert_eq!(settings.logger.capacity, 200);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_security_level_parsing() {
        assert_eq!("basic".parse::<SecurityLevel>(), Ok(SecurityLevel::Basic));
        assert_eq!(" Moderate ".parse::<SecurityLevel>(), Ok(SecurityLevel::Moderate));
        assert!(matches!(
            "paranoid".parse::<SecurityLevel>(),
            Err(ConfigError::InvalidSecurityLevel(_))
        ));
    }

    #[test]
    fn test_level_stage_table() {
        assert!(!SecurityLevel::Basic.checks_nonce());
        assert!(!SecurityLevel::Basic.checks_signature(true));
        assert!(SecurityLevel::Moderate.checks_nonce());
        assert!(!SecurityLevel::Moderate.checks_signature(false));
        assert!(SecurityLevel::Moderate.checks_signature(true));
        assert!(SecurityLevel::Strict.checks_signature(false));
    }

    #[test]
    fn test_validation_rejects_weak_settings() {
        let mut settings = SecuritySettings::default();
        settings.signer.iterations = 1_000;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let mut settings = SecuritySettings::default();
        settings.nonce.ttl = Duration::ZERO;
        assert!(settings.validate().is_err());

        let mut settings = SecuritySettings::default();
        settings.logger.capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_level_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&SecurityLevel::Moderate).unwrap(),
            "\"moderate\""
        );
    }
}
