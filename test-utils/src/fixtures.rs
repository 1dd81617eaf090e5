//! Test fixtures with sample data.
//!
//! [`Harness`] wires an [`AuthManager`] and a [`SecretLeaseCache`] to a
//! [`MockSecretEngine`] and a [`ManualClock`] starting at the Unix epoch, so
//! tests can express time as plain second offsets.

use crate::mocks::MockSecretEngine;
use auth_vault_lease::{
    AuthManager, AuthMethod, CacheKey, Clock, ManualClock, RemoteSecretEngine, SecretLeaseCache,
    VaultConfig,
};
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

/// Grace period used by [`test_config`].
pub const GRACE_SECS: u64 = 3;

/// Instant `secs` seconds after the Unix epoch.
#[must_use]
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs)
}

/// Userpass configuration with a 3 second grace period.
#[must_use]
pub fn test_config() -> VaultConfig {
    VaultConfig::new(
        "http://127.0.0.1:8200",
        AuthMethod::UserPass {
            username: "bob".to_string(),
            password: SecretString::from("sinclair"),
        },
    )
    .with_renew_grace_period(Duration::from_secs(GRACE_SECS))
    .with_timeouts(Duration::from_secs(5), Duration::from_secs(5))
}

/// `database/creds/mydbrole`.
#[must_use]
pub fn database_key() -> CacheKey {
    CacheKey::database("mydbrole")
}

/// Token manager and lease cache backed by a mock engine and a manual clock.
pub struct Harness {
    /// Clock shared with the components
    pub clock: ManualClock,
    /// Engine shared with the components
    pub engine: Arc<MockSecretEngine>,
    /// Token manager
    pub auth: Arc<AuthManager>,
    /// Lease cache
    pub cache: SecretLeaseCache,
}

impl Harness {
    /// Harness using [`test_config`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&test_config())
    }

    /// Harness using `config`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is rejected.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_config(config: &VaultConfig) -> Self {
        let clock = ManualClock::at_epoch();
        let engine = Arc::new(MockSecretEngine::new());
        let remote: Arc<dyn RemoteSecretEngine> = engine.clone();
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

        let auth = Arc::new(
            AuthManager::new(config, remote.clone(), shared_clock.clone())
                .expect("test config is valid"),
        );
        let cache = SecretLeaseCache::new(config, auth.clone(), remote, shared_clock)
            .expect("test config is valid");

        Self {
            clock,
            engine,
            auth,
            cache,
        }
    }

    /// Move the clock to `secs` seconds after the epoch.
    pub fn set_time(&self, secs: i64) {
        self.clock.set(at(secs));
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
