//! Vault HTTP client implementing [`RemoteSecretEngine`].

use crate::{
    cache::CacheKey,
    config::{AuthMethod, VaultConfig},
    engine::{
        CredentialsPayload, GeneratedSecret, LeaseInfo, RemoteSecretEngine, RenewedLease,
        TokenGrant, TokenInfo,
    },
    error::{VaultError, VaultResult},
    secrets::{
        AuthResponse, DatabaseCredsResponse, LeaseLookupResponse, LeaseRenewResponse,
        LeaseRequest, LookupSelfResponse,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Which family of endpoint a request targets; drives status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Login,
    Token,
    Secret,
    Lease,
}

/// Vault client over HTTP.
#[derive(Debug, Clone)]
pub struct VaultClient {
    addr: String,
    http: Client,
}

impl VaultClient {
    /// Create a new Vault client.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] for an invalid configuration or
    /// an HTTP client that cannot be built.
    pub fn new(config: &VaultConfig) -> VaultResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.read_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .build()
            .map_err(|e| VaultError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            addr: config.addr.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn request(&self, method: Method, path: &str, token: Option<&SecretString>) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.addr, path);
        let request = self.http.request(method, url);
        match token {
            Some(token) => request.header(TOKEN_HEADER, token.expose_secret()),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
        endpoint: Endpoint,
    ) -> VaultResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| VaultError::transient(format!("{path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = map_status(status, path, endpoint, &text);
            warn!(path, %status, "Vault request failed");
            return Err(err);
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(VaultError::from)
    }

    async fn login_with(&self, path: &str, body: serde_json::Value) -> VaultResult<TokenGrant> {
        let request = self.request(Method::POST, path, None).json(&body);
        let response: AuthResponse = self.send(request, path, Endpoint::Login).await?;
        Ok(grant_from(response))
    }
}

fn map_status(status: StatusCode, path: &str, endpoint: Endpoint, body: &str) -> VaultError {
    let detail = format!("{path}: status {status}: {body}");
    match (status.as_u16(), endpoint) {
        (401 | 403, _) | (400, Endpoint::Login) => VaultError::Authentication(detail),
        (400 | 404, Endpoint::Lease) => VaultError::InvalidLease(detail),
        (429, _) => VaultError::Transient(detail),
        (s, _) if s >= 500 => VaultError::Transient(detail),
        _ => VaultError::Protocol(detail),
    }
}

fn grant_from(response: AuthResponse) -> TokenGrant {
    TokenGrant {
        client_token: SecretString::from(response.auth.client_token),
        renewable: response.auth.renewable,
        lease_duration_secs: response.auth.lease_duration,
    }
}

#[async_trait]
impl RemoteSecretEngine for VaultClient {
    #[instrument(skip_all, fields(method = auth.name()))]
    async fn login(&self, auth: &AuthMethod) -> VaultResult<TokenGrant> {
        match auth {
            AuthMethod::Token(token) => {
                let info = self.lookup_self(token).await?;
                Ok(TokenGrant {
                    client_token: token.clone(),
                    renewable: info.renewable,
                    lease_duration_secs: info.lease_duration_secs,
                })
            }
            AuthMethod::AppRole { role_id, secret_id } => {
                let body = serde_json::json!({
                    "role_id": role_id,
                    "secret_id": secret_id.expose_secret(),
                });
                self.login_with("auth/approle/login", body).await
            }
            AuthMethod::UserPass { username, password } => {
                let body = serde_json::json!({ "password": password.expose_secret() });
                self.login_with(&format!("auth/userpass/login/{username}"), body)
                    .await
            }
            AuthMethod::Kubernetes { role, jwt_path } => {
                let jwt = tokio::fs::read_to_string(jwt_path)
                    .await
                    .map_err(|e| VaultError::auth_failed(format!("{jwt_path}: {e}")))?;
                let body = serde_json::json!({
                    "role": role,
                    "jwt": jwt.trim(),
                });
                self.login_with("auth/kubernetes/login", body).await
            }
        }
    }

    #[instrument(skip_all)]
    async fn lookup_self(&self, token: &SecretString) -> VaultResult<TokenInfo> {
        let path = "auth/token/lookup-self";
        let request = self.request(Method::GET, path, Some(token));
        let response: LookupSelfResponse = self.send(request, path, Endpoint::Token).await?;
        Ok(TokenInfo {
            renewable: response.data.renewable,
            lease_duration_secs: response.data.ttl,
        })
    }

    #[instrument(skip_all)]
    async fn renew_self(&self, token: &SecretString) -> VaultResult<TokenGrant> {
        let path = "auth/token/renew-self";
        let request = self
            .request(Method::POST, path, Some(token))
            .json(&serde_json::json!({}));
        let response: AuthResponse = self.send(request, path, Endpoint::Token).await?;
        Ok(grant_from(response))
    }

    #[instrument(skip(self, token, key), fields(key = %key))]
    async fn generate_credentials(
        &self,
        token: &SecretString,
        key: &CacheKey,
    ) -> VaultResult<GeneratedSecret> {
        let path = key.path();
        debug!(path, "Generating dynamic credentials");
        let request = self.request(Method::GET, &path, Some(token));
        let response: DatabaseCredsResponse = self.send(request, &path, Endpoint::Secret).await?;
        Ok(GeneratedSecret {
            lease_id: response.lease_id,
            renewable: response.renewable,
            lease_duration_secs: response.lease_duration,
            payload: CredentialsPayload {
                username: response.data.username,
                password: SecretString::from(response.data.password),
            },
        })
    }

    #[instrument(skip(self, token))]
    async fn lookup_lease(&self, token: &SecretString, lease_id: &str) -> VaultResult<LeaseInfo> {
        let path = "sys/leases/lookup";
        let request = self
            .request(Method::PUT, path, Some(token))
            .json(&LeaseRequest { lease_id });
        let response: LeaseLookupResponse = self.send(request, path, Endpoint::Lease).await?;
        Ok(LeaseInfo {
            lease_id: response.data.id,
        })
    }

    #[instrument(skip(self, token))]
    async fn renew_lease(&self, token: &SecretString, lease_id: &str) -> VaultResult<RenewedLease> {
        let path = "sys/leases/renew";
        let request = self
            .request(Method::PUT, path, Some(token))
            .json(&LeaseRequest { lease_id });
        let response: LeaseRenewResponse = self.send(request, path, Endpoint::Lease).await?;
        Ok(RenewedLease {
            lease_id: response.lease_id,
            renewable: response.renewable,
            lease_duration_secs: response.lease_duration,
        })
    }
}
