//! # Nonce Manager
//!
//! Issues one-time, time-limited tokens and enforces replay prevention.
//!
//! ## Security Design
//!
//! - Nonces are 16 bytes from the OS CSPRNG, hex-encoded to 32 lowercase chars
//! - A nonce validates successfully AT MOST ONCE: success removes it
//! - Expired nonces are rejected even if never consumed
//! - A background sweep removes expired entries every minute so the store
//!   stays bounded under traffic that never comes back to validate
//!
//! The check-and-remove in [`NonceManager::validate`] runs under a single
//! mutex, so two concurrent validations of the same nonce cannot both
//! succeed. The sweep takes the same lock; an entry it removes is simply
//! "not found" for a racing validation.
//!
//! Nonces are looked up by key and never compared value against value, so no
//! constant-time comparison is involved here.

use crate::domain::config::NonceConfig;
use crate::domain::errors::NonceError;
use crate::ports::outbound::{EntropySource, NonceAuthority, OsEntropy};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Attempts to draw a nonce not already tracked before giving up.
const MAX_GENERATE_ATTEMPTS: usize = 4;

/// A tracked nonce.
#[derive(Debug, Clone)]
struct NonceEntry {
    created_at: Instant,
    expires_at: Instant,
}

type NonceStore = Mutex<HashMap<String, NonceEntry>>;

/// Process-local nonce issuer and verifier.
///
/// Instances never share state. Dropping the manager cancels its sweep.
pub struct NonceManager {
    /// Map of nonce -> metadata
    store: Arc<NonceStore>,
    config: NonceConfig,
    entropy: Arc<dyn EntropySource>,
    /// Background sweep, if scheduled
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl NonceManager {
    /// Create a nonce manager with default settings (5 min TTL, 1 min sweep).
    pub fn new() -> Self {
        Self::with_config(NonceConfig::default())
    }

    /// Create a nonce manager with custom settings.
    pub fn with_config(config: NonceConfig) -> Self {
        Self::with_entropy(config, Arc::new(OsEntropy))
    }

    /// Create a nonce manager drawing from a specific random source.
    pub fn with_entropy(config: NonceConfig, entropy: Arc<dyn EntropySource>) -> Self {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
            config,
            entropy,
            cleanup: Mutex::new(None),
        }
    }

    /// Generate a new nonce and start tracking it.
    ///
    /// # Errors
    ///
    /// - `NonceError::EntropyUnavailable` if the secure random source fails
    pub fn generate(&self) -> Result<String, NonceError> {
        let mut bytes = vec![0u8; self.config.nonce_length_bytes];

        for _ in 0..MAX_GENERATE_ATTEMPTS {
            self.entropy.fill(&mut bytes)?;
            let token = hex::encode(&bytes);

            let now = Instant::now();
            let mut store = self.store.lock();
            if store.contains_key(&token) {
                continue;
            }
            store.insert(
                token.clone(),
                NonceEntry {
                    created_at: now,
                    expires_at: now + self.config.ttl,
                },
            );
            return Ok(token);
        }

        // A healthy CSPRNG does not repeat 128-bit values.
        Err(NonceError::EntropyUnavailable(
            "random source repeated tracked nonces".to_string(),
        ))
    }

    /// Validate and consume a nonce.
    ///
    /// Returns `false` if the nonce is malformed, unknown, expired or was
    /// already consumed. On success the nonce is removed, so a second call
    /// with the same value returns `false`.
    pub fn validate(&self, nonce: &str) -> bool {
        if !self.is_well_formed(nonce) {
            return false;
        }

        // Remove first: whatever happens next, this nonce is spent.
        let entry = match self.store.lock().remove(nonce) {
            Some(entry) => entry,
            None => return false,
        };

        if Instant::now() >= entry.expires_at {
            debug!(
                age_ms = entry.created_at.elapsed().as_millis() as u64,
                "Rejected expired nonce"
            );
            return false;
        }
        true
    }

    /// Remove every expired nonce. Returns how many were removed.
    pub fn cleanup_expired_nonces(&self) -> usize {
        sweep(&self.store)
    }

    /// Schedule the periodic expiry sweep on the current tokio runtime.
    ///
    /// Calling this while a sweep is already running is a no-op.
    ///
    /// # Errors
    ///
    /// - `NonceError::NoRuntime` when called outside a tokio runtime
    pub fn start_cleanup(&self) -> Result<(), NonceError> {
        let mut slot = self.cleanup.lock();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| NonceError::NoRuntime)?;
        let store = Arc::downgrade(&self.store);
        let period = self.config.cleanup_interval;
        // First sweep is due one period after this call, not after the task's first poll.
        let first_sweep = Instant::now() + period;

        *slot = Some(runtime.spawn(run_cleanup(store, first_sweep, period)));
        debug!(interval_ms = period.as_millis() as u64, "Nonce cleanup scheduled");
        Ok(())
    }

    /// Cancel the periodic sweep, if running.
    pub fn stop_cleanup(&self) {
        if let Some(handle) = self.cleanup.lock().take() {
            handle.abort();
        }
    }

    /// Returns true while the periodic sweep is scheduled.
    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Forget all nonces.
    pub fn clear(&self) {
        self.store.lock().clear();
    }

    /// Number of tracked nonces.
    pub fn size(&self) -> usize {
        self.store.lock().len()
    }

    /// Settings in effect.
    pub fn config(&self) -> &NonceConfig {
        &self.config
    }

    fn is_well_formed(&self, nonce: &str) -> bool {
        nonce.len() == self.config.token_len() && nonce.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl Default for NonceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NonceManager {
    fn drop(&mut self) {
        self.stop_cleanup();
    }
}

impl std::fmt::Debug for NonceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceManager")
            .field("active", &self.size())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NonceAuthority for NonceManager {
    fn generate(&self) -> Result<String, NonceError> {
        NonceManager::generate(self)
    }

    fn validate(&self, nonce: &str) -> bool {
        NonceManager::validate(self, nonce)
    }

    fn active_count(&self) -> usize {
        self.size()
    }

    fn config(&self) -> NonceConfig {
        self.config.clone()
    }

    fn start_cleanup(&self) -> Result<(), NonceError> {
        NonceManager::start_cleanup(self)
    }

    fn stop_cleanup(&self) {
        NonceManager::stop_cleanup(self)
    }
}

async fn run_cleanup(store: Weak<NonceStore>, first_sweep: Instant, period: std::time::Duration) {
    let mut ticker = tokio::time::interval_at(first_sweep, period);
    loop {
        ticker.tick().await;
        let Some(store) = store.upgrade() else {
            break;
        };
        let removed = sweep(&store);
        if removed > 0 {
            debug!(removed, "Swept expired nonces");
        }
    }
    warn!("Nonce store dropped; cleanup task exiting");
}

fn sweep(store: &NonceStore) -> usize {
    let now = Instant::now();
    let mut store = store.lock();
    let before = store.len();
    store.retain(|_, entry| now < entry.expires_at);
    before - store.len()
}
