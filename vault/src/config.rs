//! Vault client configuration.

use crate::error::{VaultError, VaultResult};
use secrecy::SecretString;
use std::time::Duration;

/// How the client proves its identity to Vault.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Pre-issued client token.
    ///
    /// Its lease is read from lookup-self. A non-expiring token (ttl 0, such
    /// as a root token) has no usable lease and is rejected with
    /// [`VaultError::Protocol`](crate::VaultError::Protocol) at login.
    Token(SecretString),
    /// AppRole login
    AppRole {
        /// Role id
        role_id: String,
        /// Secret id
        secret_id: SecretString,
    },
    /// Userpass login
    UserPass {
        /// Username
        username: String,
        /// Password
        password: SecretString,
    },
    /// Kubernetes service account login
    Kubernetes {
        /// Kubernetes auth role name
        role: String,
        /// Service account token path
        jwt_path: String,
    },
}

impl AuthMethod {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::AppRole { .. } => "approle",
            Self::UserPass { .. } => "userpass",
            Self::Kubernetes { .. } => "kubernetes",
        }
    }
}

/// Default service account token path.
pub const DEFAULT_KUBERNETES_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Vault client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address
    pub addr: String,
    /// Authentication method
    pub auth: AuthMethod,
    /// Trailing part of a lease during which renewal is attempted
    pub renew_grace_period: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Read timeout, applied to every remote call
    pub read_timeout: Duration,
    /// Validate a cached token with lookup-self before reusing it
    pub validate_token: bool,
    /// User agent string
    pub user_agent: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: std::env::var("VAULT_ADDR")
                .unwrap_or_else(|_| "https://vault.vault.svc:8200".to_string()),
            auth: AuthMethod::Kubernetes {
                role: std::env::var("VAULT_KUBERNETES_ROLE").unwrap_or_default(),
                jwt_path: DEFAULT_KUBERNETES_JWT_PATH.to_string(),
            },
            renew_grace_period: Duration::from_secs(3600),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(1),
            validate_token: true,
            user_agent: "auth-platform-vault/1.0".to_string(),
        }
    }
}

impl VaultConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(addr: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            addr: addr.into(),
            auth,
            ..Default::default()
        }
    }

    /// Load configuration from `VAULT_*` environment variables.
    ///
    /// The auth method is picked from the first complete set among
    /// `VAULT_TOKEN`, `VAULT_ROLE_ID`/`VAULT_SECRET_ID`,
    /// `VAULT_USERNAME`/`VAULT_PASSWORD` and `VAULT_KUBERNETES_ROLE`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] for unparsable numbers or a
    /// configuration that fails [`VaultConfig::validate`].
    pub fn from_env() -> VaultResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`VaultConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// See [`VaultConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> VaultResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            addr: lookup("VAULT_ADDR").unwrap_or_else(|| "https://vault.vault.svc:8200".to_string()),
            auth: auth_from_lookup(&lookup),
            ..Self::default()
        };

        if let Some(secs) = parse_var(&lookup, "VAULT_RENEW_GRACE_PERIOD_SECS")? {
            config.renew_grace_period = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var(&lookup, "VAULT_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "VAULT_READ_TIMEOUT_MS")? {
            config.read_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set renewal grace period.
    #[must_use]
    pub const fn with_renew_grace_period(mut self, grace_period: Duration) -> Self {
        self.renew_grace_period = grace_period;
        self
    }

    /// Set connect and read timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Enable or disable lookup-self validation of cached tokens.
    #[must_use]
    pub const fn with_token_validation(mut self, enabled: bool) -> Self {
        self.validate_token = enabled;
        self
    }

    /// Set user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Grace period as a signed delta for lease math.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if the period does not fit.
    pub fn grace_delta(&self) -> VaultResult<chrono::TimeDelta> {
        chrono::TimeDelta::from_std(self.renew_grace_period)
            .map_err(|e| VaultError::InvalidConfig(format!("renew_grace_period: {e}")))
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> VaultResult<()> {
        let url = url::Url::parse(&self.addr)
            .map_err(|e| VaultError::InvalidConfig(format!("addr {}: {e}", self.addr)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VaultError::InvalidConfig(format!(
                "addr must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.renew_grace_period.is_zero() {
            return Err(VaultError::InvalidConfig("renew_grace_period must be positive".into()));
        }
        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(VaultError::InvalidConfig("timeouts must be positive".into()));
        }
        self.grace_delta()?;
        Ok(())
    }
}

fn auth_from_lookup<F>(lookup: &F) -> AuthMethod
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup("VAULT_TOKEN") {
        return AuthMethod::Token(SecretString::from(token));
    }
    if let (Some(role_id), Some(secret_id)) = (lookup("VAULT_ROLE_ID"), lookup("VAULT_SECRET_ID")) {
        return AuthMethod::AppRole {
            role_id,
            secret_id: SecretString::from(secret_id),
        };
    }
    if let (Some(username), Some(password)) = (lookup("VAULT_USERNAME"), lookup("VAULT_PASSWORD")) {
        return AuthMethod::UserPass {
            username,
            password: SecretString::from(password),
        };
    }
    AuthMethod::Kubernetes {
        role: lookup("VAULT_KUBERNETES_ROLE").unwrap_or_default(),
        jwt_path: lookup("VAULT_KUBERNETES_JWT_PATH")
            .unwrap_or_else(|| DEFAULT_KUBERNETES_JWT_PATH.to_string()),
    }
}

fn parse_var<F>(lookup: &F, name: &str) -> VaultResult<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| VaultError::InvalidConfig(format!("{name}={raw}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.renew_grace_period, Duration::from_secs(3600));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert!(config.validate_token);
    }

    #[test]
    fn test_from_lookup_approle() {
        let config = VaultConfig::from_lookup(lookup_from(&[
            ("VAULT_ADDR", "http://127.0.0.1:8200"),
            ("VAULT_ROLE_ID", "role"),
            ("VAULT_SECRET_ID", "secret"),
            ("VAULT_RENEW_GRACE_PERIOD_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.addr, "http://127.0.0.1:8200");
        assert_eq!(config.auth.name(), "approle");
        assert_eq!(config.renew_grace_period, Duration::from_secs(3));
    }

    #[test]
    fn test_from_lookup_token_wins() {
        let config = VaultConfig::from_lookup(lookup_from(&[
            ("VAULT_ADDR", "http://127.0.0.1:8200"),
            ("VAULT_TOKEN", "s.root"),
            ("VAULT_USERNAME", "bob"),
            ("VAULT_PASSWORD", "sinclair"),
        ]))
        .unwrap();
        assert_eq!(config.auth.name(), "token");
    }

    #[test]
    fn test_from_lookup_rejects_bad_number() {
        let result = VaultConfig::from_lookup(lookup_from(&[
            ("VAULT_ADDR", "http://127.0.0.1:8200"),
            ("VAULT_READ_TIMEOUT_MS", "soon"),
        ]));
        assert!(matches!(result, Err(VaultError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate() {
        let auth = AuthMethod::Token(SecretString::from("t"));
        assert!(VaultConfig::new("http://localhost:8200", auth.clone()).validate().is_ok());
        assert!(VaultConfig::new("not a url", auth.clone()).validate().is_err());
        assert!(VaultConfig::new("ftp://vault", auth.clone()).validate().is_err());
        assert!(
            VaultConfig::new("http://localhost:8200", auth)
                .with_renew_grace_period(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let auth = AuthMethod::UserPass {
            username: "bob".to_string(),
            password: SecretString::from("sinclair"),
        };
        let debug = format!("{:?}", VaultConfig::new("http://localhost:8200", auth));
        assert!(debug.contains("bob"));
        assert!(!debug.contains("sinclair"));
    }
}
