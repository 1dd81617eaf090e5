//! Lease-aware Vault client core for Auth Platform.
//!
//! Obtains a Vault token and per-role dynamic credentials, caches them, and
//! decides on each request whether to reuse, renew or regenerate them before
//! their leases run out. Renewal is demand driven; there are no background
//! timers.
//!
//! ```no_run
//! use auth_vault_lease::{
//!     AuthManager, CacheKey, RemoteSecretEngine, SecretLeaseCache, SystemClock, VaultClient,
//!     VaultConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> auth_vault_lease::VaultResult<()> {
//! let config = VaultConfig::from_env()?;
//! let engine: Arc<dyn RemoteSecretEngine> = Arc::new(VaultClient::new(&config)?);
//! let clock = Arc::new(SystemClock);
//! let auth = Arc::new(AuthManager::new(&config, engine.clone(), clock.clone())?);
//! let cache = SecretLeaseCache::new(&config, auth, engine, clock)?;
//!
//! let creds = cache.get(&CacheKey::database("mydbrole")).await?;
//! println!("connecting as {}", creds.username);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod lease;
pub mod secrets;

pub use auth::{AuthManager, AuthState, AuthToken};
pub use cache::{CacheKey, CachedSecret, DynamicCredentials, SecretLeaseCache};
pub use client::VaultClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthMethod, VaultConfig};
pub use engine::{
    CredentialsPayload, GeneratedSecret, LeaseInfo, RemoteSecretEngine, RenewedLease, TokenGrant,
    TokenInfo,
};
pub use error::{ErrorKind, VaultError, VaultResult};
pub use lease::{Lease, LeaseAction};
