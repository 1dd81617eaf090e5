//! Vault error types using thiserror 2.0.
//!
//! Remote outcomes are folded into a small closed set of kinds so the token
//! manager and the lease cache can pattern-match their recovery behavior
//! instead of inspecting HTTP status codes.

use thiserror::Error;

/// Vault-specific errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Credential or token rejected by the server
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Lease no longer known to the server
    #[error("Invalid lease: {0}")]
    InvalidLease(String),

    /// Network failure, timeout or temporary server unavailability
    #[error("Vault unavailable: {0}")]
    Transient(String),

    /// Malformed response or violated lease invariant
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Payload-free discriminant of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`VaultError::Authentication`].
    Authentication,
    /// See [`VaultError::InvalidLease`].
    InvalidLease,
    /// See [`VaultError::Transient`].
    Transient,
    /// See [`VaultError::Protocol`].
    Protocol,
    /// See [`VaultError::InvalidConfig`].
    InvalidConfig,
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Error kind without the message.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::InvalidLease(_) => ErrorKind::InvalidLease,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Create an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an invalid lease error.
    #[must_use]
    pub fn invalid_lease(msg: impl Into<String>) -> Self {
        Self::InvalidLease(msg.into())
    }

    /// Create a transient error.
    #[must_use]
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a protocol error.
    #[must_use]
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else if err.is_builder() {
            Self::InvalidConfig(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
