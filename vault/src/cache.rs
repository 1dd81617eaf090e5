//! Dynamic secret cache with lease-aware renewal.
//!
//! One entry per [`CacheKey`]. Each request decides between returning the
//! cached credentials, renewing their lease, or generating new credentials,
//! doing the least remote work that yields credentials valid right now.
//!
//! Entries live in per-key slots guarded by their own async mutex, so
//! concurrent requests for one key run a single renew/regenerate sequence
//! and observe its result, while different keys proceed independently.

use crate::auth::AuthManager;
use crate::clock::Clock;
use crate::config::VaultConfig;
use crate::engine::{
    call_with_timeout, CredentialsPayload, GeneratedSecret, RemoteSecretEngine, RenewedLease,
};
use crate::error::{VaultError, VaultResult};
use crate::lease::{Lease, LeaseAction};
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Identity of a dynamic secret: mount, request path and role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Secret engine mount, e.g. `database`
    pub mount: String,
    /// Request path under the mount, e.g. `creds`
    pub request_path: String,
    /// Role name
    pub role: String,
}

impl CacheKey {
    /// Create a key.
    #[must_use]
    pub fn new(
        mount: impl Into<String>,
        request_path: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            mount: mount.into(),
            request_path: request_path.into(),
            role: role.into(),
        }
    }

    /// Key for `database/creds/<role>`.
    #[must_use]
    pub fn database(role: impl Into<String>) -> Self {
        Self::new("database", "creds", role)
    }

    /// Vault API path, without the `v1/` prefix.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.mount, self.request_path, self.role)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.mount, self.request_path, self.role)
    }
}

/// Cached dynamic secret.
#[derive(Debug, Clone)]
pub struct CachedSecret {
    lease_id: String,
    lease: Lease,
    payload: CredentialsPayload,
}

impl CachedSecret {
    /// Server-assigned lease handle.
    #[must_use]
    pub fn lease_id(&self) -> &str {
        &self.lease_id
    }

    /// Lease timing.
    #[must_use]
    pub const fn lease(&self) -> &Lease {
        &self.lease
    }

    fn snapshot(&self) -> DynamicCredentials {
        DynamicCredentials {
            lease_id: self.lease_id.clone(),
            username: self.payload.username.clone(),
            password: self.payload.password.clone(),
            lease: self.lease,
        }
    }
}

/// Credentials handed to callers; a copy of the cached entry.
#[derive(Clone)]
pub struct DynamicCredentials {
    /// Server-assigned lease handle
    pub lease_id: String,
    /// Generated username
    pub username: String,
    /// Generated password
    pub password: SecretString,
    /// Lease timing at the time of the request
    pub lease: Lease,
}

impl fmt::Debug for DynamicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCredentials")
            .field("lease_id", &self.lease_id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("lease", &self.lease)
            .finish()
    }
}

type Slot = Arc<tokio::sync::Mutex<Option<CachedSecret>>>;

/// Keyed cache of dynamic secrets.
pub struct SecretLeaseCache {
    auth: Arc<AuthManager>,
    engine: Arc<dyn RemoteSecretEngine>,
    clock: Arc<dyn Clock>,
    grace: TimeDelta,
    read_timeout: Duration,
    entries: Mutex<HashMap<CacheKey, Slot>>,
}

impl SecretLeaseCache {
    /// Create an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if the grace period does not fit
    /// lease math.
    pub fn new(
        config: &VaultConfig,
        auth: Arc<AuthManager>,
        engine: Arc<dyn RemoteSecretEngine>,
        clock: Arc<dyn Clock>,
    ) -> VaultResult<Self> {
        Ok(Self {
            auth,
            engine,
            clock,
            grace: config.grace_delta()?,
            read_timeout: config.read_timeout,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Return credentials for `key` that are valid right now.
    ///
    /// # Errors
    ///
    /// Propagates authentication, transient and protocol errors. A lease
    /// that vanished server side is not an error: the credentials are
    /// regenerated instead. A token rejected by Vault is discarded and the
    /// call retried once after a fresh login. The stored entry only changes
    /// on success.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn get(&self, key: &CacheKey) -> VaultResult<DynamicCredentials> {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;
        let now = self.clock.now();

        if let Some(cached) = entry.as_mut() {
            match cached.lease.action(now, self.grace) {
                LeaseAction::Reuse => {
                    debug!(lease_id = %cached.lease_id, "Dynamic secret cache hit");
                    return Ok(cached.snapshot());
                }
                LeaseAction::Extend => match self.extend(cached, now).await {
                    Ok(()) => return Ok(cached.snapshot()),
                    Err(VaultError::InvalidLease(reason)) => {
                        warn!(%reason, "Lease no longer valid, regenerating credentials");
                    }
                    Err(e) => return Err(e),
                },
                LeaseAction::Replace => {
                    debug!(lease_id = %cached.lease_id, "Cached lease expired");
                }
            }
        }

        self.regenerate(key, &mut entry, now).await
    }

    /// Forget the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock_entries().remove(key).is_some()
    }

    /// Remove entries that are empty or expired and not in use.
    ///
    /// A slot is in use from the moment a request picks it up, before it
    /// locks it, so a pending request never writes into an evicted slot.
    ///
    /// Returns the number of entries removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|_, slot| {
            // Slots are only cloned under the map lock, which we hold.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            slot.try_lock()
                .map_or(true, |entry| entry.as_ref().is_some_and(|e| !e.lease.is_expired(now)))
        });
        before - entries.len()
    }

    /// Number of keys with a slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// True if no key has been requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Keys currently cached, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.lock_entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        Arc::clone(self.lock_entries().entry(key.clone()).or_default())
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn extend(&self, cached: &mut CachedSecret, now: DateTime<Utc>) -> VaultResult<()> {
        let token = self.auth.client_token().await?;
        let renewed = match self.renew_lease(&token, &cached.lease_id).await {
            Err(VaultError::Authentication(reason)) => {
                let token = self.reauthenticate(&token, &reason).await?;
                self.renew_lease(&token, &cached.lease_id).await?
            }
            other => other?,
        };

        cached.lease.extend(now, renewed.lease_duration_secs)?;
        cached.lease_id = renewed.lease_id;
        info!(
            lease_id = %cached.lease_id,
            ttl_secs = renewed.lease_duration_secs,
            "Renewed dynamic secret lease"
        );
        Ok(())
    }

    async fn regenerate(
        &self,
        key: &CacheKey,
        entry: &mut Option<CachedSecret>,
        now: DateTime<Utc>,
    ) -> VaultResult<DynamicCredentials> {
        let token = self.auth.client_token().await?;
        let generated = match self.generate(&token, key).await {
            Err(VaultError::Authentication(reason)) => {
                let token = self.reauthenticate(&token, &reason).await?;
                self.generate(&token, key).await?
            }
            other => other?,
        };

        let cached = CachedSecret {
            lease: Lease::new(now, generated.lease_duration_secs, generated.renewable)?,
            lease_id: generated.lease_id,
            payload: generated.payload,
        };
        info!(
            lease_id = %cached.lease_id,
            ttl_secs = cached.lease.lease_duration_secs(),
            renewable = cached.lease.renewable(),
            "Generated dynamic secret"
        );

        let snapshot = cached.snapshot();
        *entry = Some(cached);
        Ok(snapshot)
    }

    /// Drop a token Vault rejected and log in once more.
    async fn reauthenticate(
        &self,
        rejected: &SecretString,
        reason: &str,
    ) -> VaultResult<SecretString> {
        warn!(%reason, "Vault token rejected, logging in again");
        self.auth.discard(rejected).await;
        self.auth.client_token().await
    }

    async fn generate(&self, token: &SecretString, key: &CacheKey) -> VaultResult<GeneratedSecret> {
        call_with_timeout(
            self.read_timeout,
            "generate credentials",
            self.engine.generate_credentials(token, key),
        )
        .await
    }

    async fn renew_lease(&self, token: &SecretString, lease_id: &str) -> VaultResult<RenewedLease> {
        call_with_timeout(
            self.read_timeout,
            "lease lookup",
            self.engine.lookup_lease(token, lease_id),
        )
        .await?;

        call_with_timeout(
            self.read_timeout,
            "lease renew",
            self.engine.renew_lease(token, lease_id),
        )
        .await
    }
}
