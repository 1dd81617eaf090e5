//! Shared test utilities for the Vault lease client.
//!
//! This crate provides:
//! - An in-memory [`RemoteSecretEngine`](auth_vault_lease::RemoteSecretEngine)
//! - Test fixtures wiring the token manager and lease cache to a manual clock
//! - Proptest generators for leases and cache keys

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::*;
pub use generators::*;
pub use mocks::{MockSecretEngine, Op};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`, defaulting to `warn`. Later calls are no-ops.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
