//! Vault token lifecycle.
//!
//! [`AuthManager`] owns the single process-wide token slot. Every other
//! remote call asks it for a bearer token; it decides whether the cached
//! token can be reused, must be renewed, or must be replaced by a new login.

use crate::clock::Clock;
use crate::config::{AuthMethod, VaultConfig};
use crate::engine::{call_with_timeout, RemoteSecretEngine, TokenGrant};
use crate::error::{VaultError, VaultResult};
use crate::lease::{Lease, LeaseAction};
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Bearer token plus its lease.
#[derive(Debug, Clone)]
pub struct AuthToken {
    client_token: SecretString,
    lease: Lease,
}

impl AuthToken {
    /// Create a token.
    #[must_use]
    pub const fn new(client_token: SecretString, lease: Lease) -> Self {
        Self {
            client_token,
            lease,
        }
    }

    fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> VaultResult<Self> {
        let lease = Lease::new(now, grant.lease_duration_secs, grant.renewable)?;
        Ok(Self::new(grant.client_token, lease))
    }

    /// Bearer token.
    #[must_use]
    pub const fn client_token(&self) -> &SecretString {
        &self.client_token
    }

    /// Token lease.
    #[must_use]
    pub const fn lease(&self) -> &Lease {
        &self.lease
    }
}

/// Classification of the cached token at the current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing cached yet; the next call logs in.
    NoToken,
    /// Cached token is reused as is.
    Valid,
    /// Cached token is in its grace window; the next call renews it.
    Renewing,
    /// Cached token is expired or may not outlive the grace window; the next
    /// call logs in again.
    Invalid,
}

/// Owner of the Vault token used to authorize every other remote call.
pub struct AuthManager {
    auth: AuthMethod,
    engine: Arc<dyn RemoteSecretEngine>,
    clock: Arc<dyn Clock>,
    grace: TimeDelta,
    read_timeout: Duration,
    validate_token: bool,
    slot: Mutex<Option<AuthToken>>,
}

impl AuthManager {
    /// Create a manager with an empty token slot.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if the grace period does not fit
    /// lease math.
    pub fn new(
        config: &VaultConfig,
        engine: Arc<dyn RemoteSecretEngine>,
        clock: Arc<dyn Clock>,
    ) -> VaultResult<Self> {
        Ok(Self {
            auth: config.auth.clone(),
            engine,
            clock,
            grace: config.grace_delta()?,
            read_timeout: config.read_timeout,
            validate_token: config.validate_token,
            slot: Mutex::new(None),
        })
    }

    /// Return a token valid right now, starting from `previous`.
    ///
    /// Reusing a still-valid token performs no login or renewal. A token
    /// rejected by Vault is replaced by exactly one fresh login.
    ///
    /// # Errors
    ///
    /// Propagates login failures and any transient or protocol error; the
    /// caller's `previous` token is not consumed by a failure.
    #[instrument(skip_all, fields(method = self.auth.name()))]
    pub async fn login(&self, previous: Option<AuthToken>) -> VaultResult<AuthToken> {
        let now = self.clock.now();

        let Some(mut token) = previous else {
            return self.fresh_login(now).await;
        };

        match token.lease.action(now, self.grace) {
            LeaseAction::Replace => {
                info!(
                    expired = token.lease.is_expired(now),
                    "Vault token cannot be reused, logging in"
                );
                self.fresh_login(now).await
            }
            LeaseAction::Extend => match self.renew(&mut token, now).await {
                Ok(()) => Ok(token),
                Err(VaultError::Authentication(reason)) => {
                    warn!(%reason, "Vault token rejected during renewal, logging in");
                    self.fresh_login(now).await
                }
                Err(e) => Err(e),
            },
            LeaseAction::Reuse if self.validate_token => {
                match call_with_timeout(
                    self.read_timeout,
                    "lookup-self",
                    self.engine.lookup_self(&token.client_token),
                )
                .await
                {
                    Ok(_) => {
                        debug!("Reusing validated Vault token");
                        Ok(token)
                    }
                    Err(VaultError::Authentication(reason)) => {
                        warn!(%reason, "Vault token no longer valid, logging in");
                        self.fresh_login(now).await
                    }
                    Err(e) => Err(e),
                }
            }
            LeaseAction::Reuse => {
                debug!("Reusing cached Vault token");
                Ok(token)
            }
        }
    }

    /// Return the shared token, logging in or renewing as needed.
    ///
    /// Callers are serialized on the token slot. The slot is only replaced
    /// on success, except that a rejected credential clears it.
    ///
    /// # Errors
    ///
    /// See [`AuthManager::login`].
    pub async fn current_token(&self) -> VaultResult<AuthToken> {
        let mut slot = self.slot.lock().await;
        match self.login(slot.clone()).await {
            Ok(token) => {
                *slot = Some(token.clone());
                Ok(token)
            }
            Err(e @ VaultError::Authentication(_)) => {
                *slot = None;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Shorthand for the bearer token of [`AuthManager::current_token`].
    ///
    /// # Errors
    ///
    /// See [`AuthManager::login`].
    pub async fn client_token(&self) -> VaultResult<SecretString> {
        Ok(self.current_token().await?.client_token)
    }

    /// Classify the cached token without any remote call.
    pub async fn state(&self) -> AuthState {
        let now = self.clock.now();
        match self.slot.lock().await.as_ref() {
            None => AuthState::NoToken,
            Some(token) => match token.lease.action(now, self.grace) {
                LeaseAction::Reuse => AuthState::Valid,
                LeaseAction::Extend => AuthState::Renewing,
                LeaseAction::Replace => AuthState::Invalid,
            },
        }
    }

    /// Drop the cached token; the next call logs in.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    /// Drop the cached token if it is still `rejected`.
    ///
    /// A token another caller already replaced is kept. Returns whether the
    /// slot was cleared.
    pub async fn discard(&self, rejected: &SecretString) -> bool {
        let mut slot = self.slot.lock().await;
        let matches = slot
            .as_ref()
            .is_some_and(|t| t.client_token.expose_secret() == rejected.expose_secret());
        if matches {
            slot.take();
        }
        matches
    }

    async fn fresh_login(&self, now: DateTime<Utc>) -> VaultResult<AuthToken> {
        let grant =
            call_with_timeout(self.read_timeout, "login", self.engine.login(&self.auth)).await?;
        let token = AuthToken::from_grant(grant, now)?;
        info!(
            ttl_secs = token.lease.lease_duration_secs(),
            renewable = token.lease.renewable(),
            "Authenticated with Vault"
        );
        Ok(token)
    }

    async fn renew(&self, token: &mut AuthToken, now: DateTime<Utc>) -> VaultResult<()> {
        let grant = call_with_timeout(
            self.read_timeout,
            "renew-self",
            self.engine.renew_self(&token.client_token),
        )
        .await?;
        token.lease.extend(now, grant.lease_duration_secs)?;
        token.client_token = grant.client_token;
        info!(ttl_secs = grant.lease_duration_secs, "Renewed Vault token");
        Ok(())
    }
}
