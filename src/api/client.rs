use super::options::{ConnectionPolicy, TransportOptions};
use crate::auth::implicit::{ImplicitTokenSource, scope_for_endpoint};
use crate::auth::interactive::InteractiveSessionProvider;
use crate::auth::{
    AuthError, Credential, ResolvedToken, TokenAcquirer, TokenProvider, select_key_credential,
    select_non_key_credentials,
};
use log::{debug, info};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Key,
    Token,
}

/// How a client authenticates; key and token auth are mutually exclusive
#[derive(Clone)]
pub enum ClientAuth {
    Key(String),
    Token(Arc<dyn TokenProvider>),
}

impl ClientAuth {
    /// Combine the builder's selections, rejecting both at once
    pub fn from_parts(
        key: Option<String>,
        provider: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Option<Self>, AuthError> {
        match (key, provider) {
            (Some(_), Some(_)) => Err(AuthError::MutualExclusivityViolation),
            (Some(key), None) => Ok(Some(ClientAuth::Key(key))),
            (None, Some(provider)) => Ok(Some(ClientAuth::Token(provider))),
            (None, None) => Ok(None),
        }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            ClientAuth::Key(_) => AuthMode::Key,
            ClientAuth::Token(_) => AuthMode::Token,
        }
    }
}

impl std::fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientAuth::Key(_) => write!(f, "Key(<redacted>)"),
            ClientAuth::Token(_) => write!(f, "Token(<provider>)"),
        }
    }
}

/// Credentials to attach to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Key(String),
    Bearer(ResolvedToken),
}

/// Database account client with its authentication configured
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    endpoint: Url,
    auth: ClientAuth,
    policy: ConnectionPolicy,
    http_client: reqwest::Client,
}

impl DatabaseClient {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth.mode()
    }

    /// Installed token provider, `None` for key-authenticated clients
    pub fn token_provider(&self) -> Option<&Arc<dyn TokenProvider>> {
        match &self.auth {
            ClientAuth::Token(provider) => Some(provider),
            ClientAuth::Key(_) => None,
        }
    }

    pub fn connection_policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    /// Get shared HTTP client for making requests (cheap clone)
    pub fn http_client(&self) -> reqwest::Client {
        self.http_client.clone()
    }

    /// Account-wide scope for this endpoint
    pub fn default_scopes(&self) -> Result<Vec<String>, AuthError> {
        scope_for_endpoint(self.endpoint.as_str())
            .map(|scope| vec![scope])
            .map_err(|e| AuthError::InvalidEndpoint {
                endpoint: self.endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    /// Resolve request credentials; only token clients touch the provider
    pub async fn authorization(&self, scopes: &[String]) -> Result<Authorization, AuthError> {
        match &self.auth {
            ClientAuth::Key(key) => Ok(Authorization::Key(key.clone())),
            ClientAuth::Token(provider) => provider.acquire_token(scopes).await.map(Authorization::Bearer),
        }
    }
}

/// Assembles [`DatabaseClient`]s from endpoints and credential lists
#[derive(Clone)]
pub struct ClientBuilder {
    interactive: Arc<dyn InteractiveSessionProvider>,
    implicit: Arc<dyn ImplicitTokenSource>,
    strict_ssl: bool,
    proxy: Option<String>,
}

impl ClientBuilder {
    pub fn new(interactive: Arc<dyn InteractiveSessionProvider>, implicit: Arc<dyn ImplicitTokenSource>) -> Self {
        Self {
            interactive,
            implicit,
            strict_ssl: true,
            proxy: None,
        }
    }

    /// Certificate verification for non-emulator https endpoints
    pub fn strict_ssl(mut self, strict_ssl: bool) -> Self {
        self.strict_ssl = strict_ssl;
        self
    }

    /// Proxy applied unless the caller's transport options override it
    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Build a client; no network I/O happens here
    ///
    /// A key credential always wins. Without one, the identity credentials
    /// back a lazily invoked token provider.
    pub fn build(
        &self,
        endpoint: &str,
        credentials: &[Credential],
        is_emulator: bool,
        options: TransportOptions,
    ) -> Result<DatabaseClient, AuthError> {
        let url = Url::parse(endpoint).map_err(|e| AuthError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(AuthError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "expected an http(s) URL with a host".to_string(),
            });
        }

        let key = select_key_credential(credentials).map(str::to_string);
        let provider: Option<Arc<dyn TokenProvider>> = if key.is_none() {
            let identities = select_non_key_credentials(credentials);
            if identities.is_empty() {
                None
            } else {
                Some(Arc::new(TokenAcquirer::new(
                    identities,
                    self.interactive.clone(),
                    self.implicit.clone(),
                )))
            }
        } else {
            None
        };

        let auth = ClientAuth::from_parts(key, provider)?.ok_or_else(|| AuthError::NoCredential {
            endpoint: endpoint.to_string(),
        })?;

        let policy = ConnectionPolicy::base(url.scheme() == "https", is_emulator, self.strict_ssl, self.proxy.clone())
            .merge(&options);

        let mut http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(policy.request_timeout)
            .connect_timeout(policy.connect_timeout)
            .user_agent(policy.user_agent.clone());
        if !policy.tls_verification {
            debug!("TLS certificate verification disabled for {}", endpoint);
            http = http.danger_accept_invalid_certs(true);
        }
        if let Some(proxy) = &policy.proxy {
            http = http.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        let http_client = http.build()?;

        info!(
            "Built client for {} using {:?} authentication{}",
            url,
            auth.mode(),
            if is_emulator { " (emulator)" } else { "" }
        );

        Ok(DatabaseClient {
            endpoint: url,
            auth,
            policy,
            http_client,
        })
    }
}
