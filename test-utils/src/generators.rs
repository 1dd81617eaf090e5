//! Shared proptest generators.

use auth_vault_lease::{CacheKey, Lease};
use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;

/// Generate lease creation instants within roughly a year of the epoch.
pub fn created_at_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..31_536_000).prop_map(|secs| DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs))
}

/// Generate lease durations between one second and a day.
pub fn lease_duration_strategy() -> impl Strategy<Value = i64> {
    1i64..86_400
}

/// Generate grace windows between one second and an hour.
pub fn grace_strategy() -> impl Strategy<Value = TimeDelta> {
    (1i64..3_600).prop_map(TimeDelta::seconds)
}

/// Generate leases with arbitrary renewability.
pub fn lease_strategy() -> impl Strategy<Value = Lease> {
    (created_at_strategy(), lease_duration_strategy(), any::<bool>()).prop_filter_map(
        "valid lease",
        |(created_at, duration, renewable)| Lease::new(created_at, duration, renewable).ok(),
    )
}

/// Generate renewable leases.
pub fn renewable_lease_strategy() -> impl Strategy<Value = Lease> {
    (created_at_strategy(), lease_duration_strategy())
        .prop_filter_map("valid lease", |(created_at, duration)| {
            Lease::new(created_at, duration, true).ok()
        })
}

/// Generate cache keys.
pub fn cache_key_strategy() -> impl Strategy<Value = CacheKey> {
    (
        prop_oneof![Just("database".to_string()), "[a-z]{3,10}"],
        prop_oneof![Just("creds".to_string()), Just("static-creds".to_string())],
        "[a-z][a-z0-9-]{2,15}",
    )
        .prop_map(|(mount, request_path, role)| CacheKey::new(mount, request_path, role))
}

/// Generate secret values.
pub fn secret_value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9!@#$%^&*]{8,64}"
}

/// Generate usernames.
pub fn username_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{3,15}"
}

/// Generate lease IDs.
pub fn lease_id_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{8}/[a-z0-9]{8}/[a-z0-9]{8}"
}
