//! Vault wire types.
//!
//! Only the fields the lease engine reads are modelled; serde ignores the rest.

use serde::{Deserialize, Serialize};

/// Response of `auth/*/login` and `auth/token/renew-self`.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    /// Auth block
    pub auth: AuthData,
}

/// Auth block of a login or renew response.
#[derive(Debug, Deserialize)]
pub struct AuthData {
    /// Issued token
    pub client_token: String,
    /// Token accessor
    #[serde(default)]
    pub accessor: String,
    /// Attached policies
    #[serde(default)]
    pub policies: Vec<String>,
    /// Validity in seconds
    pub lease_duration: i64,
    /// Whether the token is renewable
    pub renewable: bool,
}

/// Response of `auth/token/lookup-self`.
#[derive(Debug, Deserialize)]
pub struct LookupSelfResponse {
    /// Token data
    pub data: LookupSelfData,
}

/// Token data of a lookup-self response.
#[derive(Debug, Deserialize)]
pub struct LookupSelfData {
    /// Remaining validity in seconds; zero for root tokens
    pub ttl: i64,
    /// Whether the token is renewable
    #[serde(default)]
    pub renewable: bool,
}

/// Dynamic database credentials response.
#[derive(Debug, Deserialize)]
pub struct DatabaseCredsResponse {
    /// Credentials
    pub data: DatabaseCredsData,
    /// Lease handle
    pub lease_id: String,
    /// Validity in seconds
    pub lease_duration: i64,
    /// Whether the lease is renewable
    pub renewable: bool,
}

/// Credential block of a database credentials response.
#[derive(Debug, Deserialize)]
pub struct DatabaseCredsData {
    /// Generated username
    pub username: String,
    /// Generated password
    pub password: String,
}

/// Response of `sys/leases/lookup`.
#[derive(Debug, Deserialize)]
pub struct LeaseLookupResponse {
    /// Lease data
    pub data: LeaseLookupData,
}

/// Lease data of a lookup response.
#[derive(Debug, Deserialize)]
pub struct LeaseLookupData {
    /// Lease handle
    pub id: String,
    /// Remaining validity in seconds
    #[serde(default)]
    pub ttl: i64,
    /// Whether the lease is renewable
    #[serde(default)]
    pub renewable: bool,
}

/// Response of `sys/leases/renew`.
#[derive(Debug, Deserialize)]
pub struct LeaseRenewResponse {
    /// Lease handle
    pub lease_id: String,
    /// New validity in seconds
    pub lease_duration: i64,
    /// Whether the lease is renewable
    pub renewable: bool,
}

/// Body of the `sys/leases/*` requests.
#[derive(Debug, Serialize)]
pub struct LeaseRequest<'a> {
    /// Lease handle
    pub lease_id: &'a str,
}
