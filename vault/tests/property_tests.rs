//! Property-based tests for lease math and secret handling.
//!
//! Tests validate:
//! - Expiry is monotonic in time
//! - The grace window is exactly `[expire - grace, expire)` for renewable leases
//! - Non-renewable leases are never extended
//! - Renewal touches timing only
//! - Secrets never show up in debug output

use auth_vault_lease::{
    AuthToken, CacheKey, DynamicCredentials, Lease, LeaseAction,
};
use chrono::TimeDelta;
use proptest::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use test_utils::{
    cache_key_strategy, grace_strategy, lease_id_strategy, lease_strategy,
    renewable_lease_strategy, secret_value_strategy, username_strategy,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Once expired, a lease stays expired.
    #[test]
    fn prop_expiry_is_monotonic(
        lease in lease_strategy(),
        offset in -100_000i64..200_000,
        step in 0i64..100_000,
    ) {
        let now = lease.created_at() + TimeDelta::seconds(offset);
        let later = now + TimeDelta::seconds(step);
        if lease.is_expired(now) {
            prop_assert!(lease.is_expired(later));
        }
    }

    /// `should_extend` holds exactly inside the trailing grace window.
    #[test]
    fn prop_grace_window_bounds(
        lease in renewable_lease_strategy(),
        grace in grace_strategy(),
        offset in -10i64..100_000,
    ) {
        let now = lease.created_at() + TimeDelta::seconds(offset);
        let expire = lease.expire_instant();
        let inside = now >= expire - grace && now < expire;
        prop_assert_eq!(lease.should_extend(now, grace), inside);
    }

    /// A freshly issued renewable lease longer than the grace window is not
    /// due for renewal.
    #[test]
    fn prop_fresh_lease_not_extended(
        lease in renewable_lease_strategy(),
        grace in grace_strategy(),
    ) {
        prop_assume!(TimeDelta::seconds(lease.lease_duration_secs()) > grace);
        prop_assert!(!lease.should_extend(lease.created_at(), grace));
        prop_assert_eq!(lease.action(lease.created_at(), grace), LeaseAction::Reuse);
    }

    /// Non-renewable leases never report `should_extend` and refuse `extend`.
    #[test]
    fn prop_non_renewable_never_extends(
        lease in lease_strategy(),
        grace in grace_strategy(),
        offset in -100_000i64..200_000,
    ) {
        prop_assume!(!lease.renewable());
        let now = lease.created_at() + TimeDelta::seconds(offset);
        prop_assert!(!lease.should_extend(now, grace));
        prop_assert_ne!(lease.action(now, grace), LeaseAction::Extend);

        let mut copy = lease;
        prop_assert!(copy.extend(now, 60).is_err());
        prop_assert_eq!(copy, lease);
    }

    /// Renewal keeps the renewable flag and never moves `created_at` back.
    #[test]
    fn prop_extend_updates_timing_only(
        lease in renewable_lease_strategy(),
        offset in -100i64..100_000,
        duration in 1i64..86_400,
    ) {
        let now = lease.created_at() + TimeDelta::seconds(offset);
        let mut renewed = lease;
        renewed.extend(now, duration).unwrap();

        prop_assert!(renewed.renewable());
        prop_assert_eq!(renewed.lease_duration_secs(), duration);
        prop_assert!(renewed.created_at() >= lease.created_at());
        prop_assert_eq!(renewed.created_at(), lease.created_at().max(now));
    }

    /// Dynamic credentials never expose the password in debug output.
    #[test]
    fn prop_credentials_password_redacted(
        username in username_strategy(),
        password in secret_value_strategy(),
        lease_id in lease_id_strategy(),
        lease in lease_strategy(),
    ) {
        let creds = DynamicCredentials {
            lease_id: lease_id.clone(),
            username: username.clone(),
            password: SecretString::from(password.clone()),
            lease,
        };

        let debug_output = format!("{creds:?}");

        prop_assert!(!debug_output.contains(&password));
        prop_assert!(debug_output.contains(&username));
        prop_assert!(debug_output.contains(&lease_id));
        prop_assert_eq!(creds.password.expose_secret(), password.as_str());
    }

    /// Tokens never expose the client token in debug output.
    #[test]
    fn prop_token_redacted(
        token in secret_value_strategy(),
        lease in lease_strategy(),
    ) {
        let auth_token = AuthToken::new(SecretString::from(token.clone()), lease);
        let debug_output = format!("{auth_token:?}");
        prop_assert!(!debug_output.contains(&token));
    }

    /// Cache key display and API path agree.
    #[test]
    fn prop_cache_key_path(key in cache_key_strategy()) {
        prop_assert_eq!(key.to_string(), key.path());
        prop_assert!(!key.path().contains("//"));
        prop_assert_eq!(
            CacheKey::new(key.mount.clone(), key.request_path.clone(), key.role.clone()),
            key
        );
    }
}

/// Test that leases with a non-positive duration are rejected.
#[test]
fn test_non_positive_duration_rejected() {
    let now = chrono::Utc::now();
    assert!(Lease::new(now, 0, true).is_err());
    assert!(Lease::new(now, -1, false).is_err());
}
