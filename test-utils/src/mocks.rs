//! In-memory secret engine for testing.
//!
//! Issues tokens `"1"`, `"2"`, ... and passwords `"<prefix>1"`, `"<prefix>2"`,
//! ... so tests can tell exactly which remote call produced a value.

use async_trait::async_trait;
use auth_vault_lease::{
    AuthMethod, CacheKey, CredentialsPayload, ErrorKind, GeneratedSecret, LeaseInfo,
    RemoteSecretEngine, RenewedLease, TokenGrant, TokenInfo, VaultError, VaultResult,
};
use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Remote operation, used to count calls and script failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `login`
    Login,
    /// `lookup_self`
    LookupSelf,
    /// `renew_self`
    RenewSelf,
    /// `generate_credentials`
    GenerateCredentials,
    /// `lookup_lease`
    LookupLease,
    /// `renew_lease`
    RenewLease,
}

#[derive(Debug)]
struct MockState {
    token_seq: u64,
    password_seq: u64,
    password_prefix: String,
    token_ttl: i64,
    token_renewable: bool,
    secret_ttl: i64,
    secret_renewable: bool,
    valid_tokens: HashSet<String>,
    live_leases: HashSet<String>,
    failures: HashMap<Op, VecDeque<ErrorKind>>,
    calls: HashMap<Op, usize>,
    latency: Option<Duration>,
}

/// Mock Vault for testing.
#[derive(Debug)]
pub struct MockSecretEngine {
    state: Mutex<MockState>,
}

impl Default for MockSecretEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSecretEngine {
    /// Create an engine issuing renewable 10 second leases.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                token_seq: 0,
                password_seq: 0,
                password_prefix: "sinclair".to_string(),
                token_ttl: 10,
                token_renewable: true,
                secret_ttl: 10,
                secret_renewable: true,
                valid_tokens: HashSet::new(),
                live_leases: HashSet::new(),
                failures: HashMap::new(),
                calls: HashMap::new(),
                latency: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the lease issued with tokens.
    pub fn set_token_lease(&self, ttl_secs: i64, renewable: bool) {
        let mut state = self.lock();
        state.token_ttl = ttl_secs;
        state.token_renewable = renewable;
    }

    /// Set the lease issued with generated and renewed secrets.
    pub fn set_secret_lease(&self, ttl_secs: i64, renewable: bool) {
        let mut state = self.lock();
        state.secret_ttl = ttl_secs;
        state.secret_renewable = renewable;
    }

    /// Sleep this long inside every call.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Make the next call of `op` fail with `kind`. Calls queue up.
    pub fn fail_next(&self, op: Op, kind: ErrorKind) {
        self.lock().failures.entry(op).or_default().push_back(kind);
    }

    /// Forget every issued token, as if they were revoked server side.
    pub fn revoke_all_tokens(&self) {
        self.lock().valid_tokens.clear();
    }

    /// Forget every issued lease.
    pub fn revoke_all_leases(&self) {
        self.lock().live_leases.clear();
    }

    /// Forget one lease.
    pub fn revoke_lease(&self, lease_id: &str) {
        self.lock().live_leases.remove(lease_id);
    }

    /// Number of calls made to `op`, including failed ones.
    #[must_use]
    pub fn calls(&self, op: Op) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of calls across all operations.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Password the next generation will return.
    #[must_use]
    pub fn next_password(&self) -> String {
        let state = self.lock();
        format!("{}{}", state.password_prefix, state.password_seq + 1)
    }

    async fn enter(&self, op: Op) -> VaultResult<()> {
        let (scripted, latency) = {
            let mut state = self.lock();
            *state.calls.entry(op).or_insert(0) += 1;
            let scripted = state.failures.get_mut(&op).and_then(VecDeque::pop_front);
            (scripted, state.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match scripted {
            Some(kind) => Err(scripted_error(op, kind)),
            None => Ok(()),
        }
    }

    fn check_token(&self, token: &SecretString) -> VaultResult<()> {
        if self.lock().valid_tokens.contains(token.expose_secret()) {
            Ok(())
        } else {
            Err(VaultError::auth_failed("permission denied"))
        }
    }

    fn issue_token(&self) -> TokenGrant {
        let mut state = self.lock();
        state.token_seq += 1;
        let token = state.token_seq.to_string();
        state.valid_tokens.insert(token.clone());
        TokenGrant {
            client_token: SecretString::from(token),
            renewable: state.token_renewable,
            lease_duration_secs: state.token_ttl,
        }
    }

    fn check_lease(&self, lease_id: &str) -> VaultResult<()> {
        if self.lock().live_leases.contains(lease_id) {
            Ok(())
        } else {
            Err(VaultError::invalid_lease(format!("lease not found: {lease_id}")))
        }
    }
}

fn scripted_error(op: Op, kind: ErrorKind) -> VaultError {
    let msg = format!("scripted {op:?} failure");
    match kind {
        ErrorKind::Authentication => VaultError::Authentication(msg),
        ErrorKind::InvalidLease => VaultError::InvalidLease(msg),
        ErrorKind::Transient => VaultError::Transient(msg),
        ErrorKind::Protocol => VaultError::Protocol(msg),
        ErrorKind::InvalidConfig => VaultError::InvalidConfig(msg),
    }
}

#[async_trait]
impl RemoteSecretEngine for MockSecretEngine {
    async fn login(&self, _auth: &AuthMethod) -> VaultResult<TokenGrant> {
        self.enter(Op::Login).await?;
        Ok(self.issue_token())
    }

    async fn lookup_self(&self, token: &SecretString) -> VaultResult<TokenInfo> {
        self.enter(Op::LookupSelf).await?;
        self.check_token(token)?;
        let state = self.lock();
        Ok(TokenInfo {
            renewable: state.token_renewable,
            lease_duration_secs: state.token_ttl,
        })
    }

    async fn renew_self(&self, token: &SecretString) -> VaultResult<TokenGrant> {
        self.enter(Op::RenewSelf).await?;
        self.check_token(token)?;
        Ok(self.issue_token())
    }

    async fn generate_credentials(
        &self,
        token: &SecretString,
        key: &CacheKey,
    ) -> VaultResult<GeneratedSecret> {
        self.enter(Op::GenerateCredentials).await?;
        self.check_token(token)?;
        let mut state = self.lock();
        state.password_seq += 1;
        let lease_id = format!("{}/{}", key.path(), uuid::Uuid::new_v4());
        state.live_leases.insert(lease_id.clone());
        Ok(GeneratedSecret {
            lease_id,
            renewable: state.secret_renewable,
            lease_duration_secs: state.secret_ttl,
            payload: CredentialsPayload {
                username: format!("v-{}-{}", key.role, state.password_seq),
                password: SecretString::from(format!(
                    "{}{}",
                    state.password_prefix, state.password_seq
                )),
            },
        })
    }

    async fn lookup_lease(&self, token: &SecretString, lease_id: &str) -> VaultResult<LeaseInfo> {
        self.enter(Op::LookupLease).await?;
        self.check_token(token)?;
        self.check_lease(lease_id)?;
        Ok(LeaseInfo {
            lease_id: lease_id.to_string(),
        })
    }

    async fn renew_lease(&self, token: &SecretString, lease_id: &str) -> VaultResult<RenewedLease> {
        self.enter(Op::RenewLease).await?;
        self.check_token(token)?;
        self.check_lease(lease_id)?;
        let state = self.lock();
        Ok(RenewedLease {
            lease_id: lease_id.to_string(),
            renewable: state.secret_renewable,
            lease_duration_secs: state.secret_ttl,
        })
    }
}
