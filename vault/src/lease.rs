//! Lease timing shared by auth tokens and dynamic secrets.
//!
//! Everything here is pure: callers sample the clock once and pass the
//! instant in, so a single decision never sees two different "now" values.

use crate::error::{VaultError, VaultResult};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// What a caller should do with a lease at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseAction {
    /// Lease is comfortably valid; use it as is.
    Reuse,
    /// Lease is renewable and inside its grace window.
    Extend,
    /// Lease is expired, or is about to expire and may not be extended.
    Replace,
}

/// Time-bounded grant of validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    created_at: DateTime<Utc>,
    lease_duration_secs: i64,
    renewable: bool,
}

impl Lease {
    /// Create a lease issued at `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Protocol`] if the duration is not positive.
    pub fn new(
        created_at: DateTime<Utc>,
        lease_duration_secs: i64,
        renewable: bool,
    ) -> VaultResult<Self> {
        validate_duration(lease_duration_secs)?;
        Ok(Self {
            created_at,
            lease_duration_secs,
            renewable,
        })
    }

    /// Instant the lease was issued or last renewed.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Promised validity in seconds.
    #[must_use]
    pub const fn lease_duration_secs(&self) -> i64 {
        self.lease_duration_secs
    }

    /// Whether the server allows extending this lease.
    #[must_use]
    pub const fn renewable(&self) -> bool {
        self.renewable
    }

    /// `created_at + lease_duration`.
    #[must_use]
    pub fn expire_instant(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(TimeDelta::seconds(self.lease_duration_secs))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Remaining lifetime, negative once expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        self.expire_instant() - now
    }

    /// True at or after the expiry instant.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire_instant()
    }

    /// True when no more than `window` of the lifetime is left.
    #[must_use]
    pub fn expires_soon(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.remaining(now) <= window
    }

    /// True when the lease is renewable, still valid, and inside the trailing
    /// `grace` window.
    #[must_use]
    pub fn should_extend(&self, now: DateTime<Utc>, grace: TimeDelta) -> bool {
        self.renewable && now >= self.expire_instant() - grace && !self.is_expired(now)
    }

    /// Decide between reuse, renewal and replacement.
    #[must_use]
    pub fn action(&self, now: DateTime<Utc>, grace: TimeDelta) -> LeaseAction {
        if self.is_expired(now) {
            LeaseAction::Replace
        } else if self.should_extend(now, grace) {
            LeaseAction::Extend
        } else if !self.renewable && self.expires_soon(now, grace) {
            LeaseAction::Replace
        } else {
            LeaseAction::Reuse
        }
    }

    /// Apply a successful renewal issued at `now`.
    ///
    /// The renewable flag never changes and `created_at` never moves backward.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Protocol`] for a non-renewable lease or a
    /// non-positive duration; the lease is left unchanged.
    pub fn extend(&mut self, now: DateTime<Utc>, lease_duration_secs: i64) -> VaultResult<()> {
        if !self.renewable {
            return Err(VaultError::protocol("non-renewable lease cannot be extended"));
        }
        validate_duration(lease_duration_secs)?;
        self.created_at = self.created_at.max(now);
        self.lease_duration_secs = lease_duration_secs;
        Ok(())
    }
}

fn validate_duration(lease_duration_secs: i64) -> VaultResult<()> {
    if lease_duration_secs <= 0 {
        return Err(VaultError::protocol(format!(
            "lease duration must be positive, got {lease_duration_secs}"
        )));
    }
    if TimeDelta::try_seconds(lease_duration_secs).is_none() {
        return Err(VaultError::protocol(format!(
            "lease duration out of range: {lease_duration_secs}"
        )));
    }
    Ok(())
}
