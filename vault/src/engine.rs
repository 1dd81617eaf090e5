//! Boundary to the remote secret store.
//!
//! [`RemoteSecretEngine`] is the only place the token manager and the lease
//! cache touch the network. [`crate::VaultClient`] implements it over HTTP;
//! tests substitute an in-memory engine.

use crate::cache::CacheKey;
use crate::config::AuthMethod;
use crate::error::{VaultError, VaultResult};
use async_trait::async_trait;
use secrecy::SecretString;
use std::future::Future;
use std::time::Duration;

/// Token issued by login or renew-self.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// Bearer token
    pub client_token: SecretString,
    /// Whether the token can be renewed
    pub renewable: bool,
    /// Validity in seconds
    pub lease_duration_secs: i64,
}

/// Token metadata returned by lookup-self.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    /// Whether the token can be renewed
    pub renewable: bool,
    /// Remaining validity in seconds
    pub lease_duration_secs: i64,
}

/// Secret material of a dynamic database credential.
#[derive(Debug, Clone)]
pub struct CredentialsPayload {
    /// Generated username
    pub username: String,
    /// Generated password
    pub password: SecretString,
}

/// Freshly generated dynamic secret.
#[derive(Debug, Clone)]
pub struct GeneratedSecret {
    /// Server-assigned lease handle
    pub lease_id: String,
    /// Whether the lease can be renewed
    pub renewable: bool,
    /// Validity in seconds
    pub lease_duration_secs: i64,
    /// Secret material
    pub payload: CredentialsPayload,
}

/// Result of a lease lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseInfo {
    /// Lease handle echoed by the server
    pub lease_id: String,
}

/// Result of a lease renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewedLease {
    /// Lease handle
    pub lease_id: String,
    /// Whether the lease can be renewed again
    pub renewable: bool,
    /// New validity in seconds, counted from the renewal
    pub lease_duration_secs: i64,
}

/// Remote operations consumed by the token manager and the lease cache.
///
/// Credential rejections surface as [`VaultError::Authentication`], vanished
/// leases as [`VaultError::InvalidLease`], and connectivity problems as
/// [`VaultError::Transient`].
#[async_trait]
pub trait RemoteSecretEngine: Send + Sync {
    /// Log in with the configured auth method.
    async fn login(&self, auth: &AuthMethod) -> VaultResult<TokenGrant>;

    /// Validate a token.
    async fn lookup_self(&self, token: &SecretString) -> VaultResult<TokenInfo>;

    /// Renew a token.
    async fn renew_self(&self, token: &SecretString) -> VaultResult<TokenGrant>;

    /// Generate new credentials for `key`.
    async fn generate_credentials(
        &self,
        token: &SecretString,
        key: &CacheKey,
    ) -> VaultResult<GeneratedSecret>;

    /// Check a lease still exists.
    async fn lookup_lease(&self, token: &SecretString, lease_id: &str) -> VaultResult<LeaseInfo>;

    /// Extend a lease.
    async fn renew_lease(&self, token: &SecretString, lease_id: &str) -> VaultResult<RenewedLease>;
}

/// Bound a remote call by `timeout`; an elapsed deadline is transient.
///
/// # Errors
///
/// Returns the call's own error, or [`VaultError::Transient`] on timeout.
pub async fn call_with_timeout<T, F>(timeout: Duration, op: &'static str, call: F) -> VaultResult<T>
where
    F: Future<Output = VaultResult<T>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| VaultError::transient(format!("{op} timed out after {timeout:?}")))?
}
