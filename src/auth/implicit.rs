//! Implicit (platform-assigned) identity
//!
//! Validates that the platform identity can actually mint a token for an
//! endpoint before it is offered as a credential.

use super::credentials::Credential;
use super::environment::PlatformProbe;
use super::token::ResolvedToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

/// Metadata service token endpoint for platform identities
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const IDENTITY_API_VERSION: &str = "2018-02-01";

/// Budget for the diagnostic fetch when the implicit identity is forced
pub const FORCED_VALIDATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Source of tokens for the implicit identity
///
/// Fails when no identity is available in this environment.
#[async_trait]
pub trait ImplicitTokenSource: Send + Sync {
    async fn get_implicit_token(&self, client_id_hint: Option<&str>, scope: &str) -> Result<ResolvedToken>;
}

/// Token source backed by the platform metadata identity endpoint
#[derive(Debug, Clone)]
pub struct ImdsTokenSource {
    endpoint: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ImdsTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
}

impl ImdsTokenSource {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_IDENTITY_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for ImdsTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImplicitTokenSource for ImdsTokenSource {
    async fn get_implicit_token(&self, client_id_hint: Option<&str>, scope: &str) -> Result<ResolvedToken> {
        let resource = scope.strip_suffix("/.default").unwrap_or(scope);

        let mut url = Url::parse(&self.endpoint)
            .with_context(|| format!("Invalid identity endpoint: {}", self.endpoint))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-version", IDENTITY_API_VERSION);
            query.append_pair("resource", resource);
            if let Some(client_id) = client_id_hint {
                query.append_pair("client_id", client_id);
            }
        }

        debug!("Requesting implicit identity token for resource {}", resource);

        let response = self
            .http_client
            .get(url)
            .header("Metadata", "true")
            .send()
            .await
            .context("Failed to reach the identity endpoint (is this process running on the platform?)")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Identity endpoint returned {}: {}", status, body);
        }

        let token: ImdsTokenResponse = response
            .json()
            .await
            .context("Invalid identity token response")?;

        // expires_on arrives as a string of epoch seconds, sometimes as a number
        let expires_at_epoch_ms = token
            .expires_on
            .as_ref()
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .map(|secs| secs.saturating_mul(1000))
            .unwrap_or(0);

        Ok(ResolvedToken::new(token.access_token, expires_at_epoch_ms))
    }
}

/// Scope covering the whole account: `<scheme>://<host>/.default`, port stripped
pub fn scope_for_endpoint(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint).with_context(|| format!("Invalid endpoint: {}", endpoint))?;
    let host = url
        .host_str()
        .with_context(|| format!("Endpoint has no host: {}", endpoint))?;
    Ok(format!("{}://{}/.default", url.scheme(), host))
}

/// Try a silent token fetch with the implicit identity
///
/// `silent` suppresses warnings, used when capabilities are probed in the
/// background rather than requested by the user. Silent failures still go to
/// `debug` so a misconfigured identity can be diagnosed.
pub async fn has_usable_implicit_identity(
    source: &dyn ImplicitTokenSource,
    endpoint: &str,
    identity_hint: Option<&str>,
    silent: bool,
) -> bool {
    let attempt = async {
        let scope = scope_for_endpoint(endpoint)?;
        source.get_implicit_token(identity_hint, &scope).await
    };

    match attempt.await {
        Ok(_) => {
            debug!("Implicit identity is usable for {}", endpoint);
            true
        }
        Err(e) => {
            if silent {
                debug!("Implicit identity unavailable for {}: {:#}", endpoint, e);
            } else {
                warn!("Implicit identity unavailable for {}: {:#}", endpoint, e);
            }
            false
        }
    }
}

/// Decide whether an implicit identity credential should be offered
///
/// Off the platform the token fetch is skipped entirely unless `force` is set.
pub async fn resolve_implicit_identity_credential(
    probe: &PlatformProbe,
    source: &dyn ImplicitTokenSource,
    endpoint: &str,
    identity_hint: Option<&str>,
    force: bool,
) -> Option<Credential> {
    if !force && !probe.is_running_on_platform().await {
        debug!("Not running on the platform, skipping implicit identity");
        return None;
    }

    let credential = Credential::implicit(identity_hint.map(str::to_string));

    if force {
        // The credential is offered regardless; the fetch only reports problems
        let validation = has_usable_implicit_identity(source, endpoint, identity_hint, false);
        match tokio::time::timeout(FORCED_VALIDATION_TIMEOUT, validation).await {
            Ok(true) => {}
            Ok(false) => info!("Implicit identity forced for {} despite failed validation", endpoint),
            Err(_) => warn!(
                "Implicit identity validation for {} did not finish within {:?}, using it anyway",
                endpoint, FORCED_VALIDATION_TIMEOUT
            ),
        }
        return Some(credential);
    }

    if has_usable_implicit_identity(source, endpoint, identity_hint, true).await {
        Some(credential)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        succeed: bool,
    }

    #[async_trait]
    impl ImplicitTokenSource for CountingSource {
        async fn get_implicit_token(&self, _client_id_hint: Option<&str>, scope: &str) -> Result<ResolvedToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(scope, "https://acct.example.com/.default");
            if self.succeed {
                Ok(ResolvedToken::new("abc", 0))
            } else {
                anyhow::bail!("no managed identity endpoint")
            }
        }
    }

    fn source(succeed: bool) -> CountingSource {
        CountingSource {
            calls: AtomicUsize::new(0),
            succeed,
        }
    }

    #[test]
    fn test_scope_strips_port_and_path() {
        assert_eq!(
            scope_for_endpoint("https://acct.example.com:443/").unwrap(),
            "https://acct.example.com/.default"
        );
        assert_eq!(
            scope_for_endpoint("http://localhost:8081/dbs/x").unwrap(),
            "http://localhost/.default"
        );
        assert!(scope_for_endpoint("acct.example.com").is_err());
    }

    #[tokio::test]
    async fn test_off_platform_skips_token_fetch() {
        let probe = PlatformProbe::resolved(false);
        let source = source(true);

        let credential =
            resolve_implicit_identity_credential(&probe, &source, "https://acct.example.com:443/", None, false)
                .await;

        assert!(credential.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_on_platform_with_usable_identity() {
        let probe = PlatformProbe::resolved(true);
        let source = source(true);

        let credential = resolve_implicit_identity_credential(
            &probe,
            &source,
            "https://acct.example.com:443/",
            Some("client-1"),
            false,
        )
        .await;

        assert_eq!(credential, Some(Credential::implicit(Some("client-1".to_string()))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_platform_with_unusable_identity() {
        let probe = PlatformProbe::resolved(true);
        let source = source(false);

        let credential =
            resolve_implicit_identity_credential(&probe, &source, "https://acct.example.com/", None, false).await;

        assert!(credential.is_none());
    }

    #[tokio::test]
    async fn test_force_bypasses_probe_and_validation() {
        let probe = PlatformProbe::resolved(false);
        let source = source(false);

        let credential =
            resolve_implicit_identity_credential(&probe, &source, "https://acct.example.com/", None, true).await;

        assert_eq!(credential, Some(Credential::implicit(None)));
    }

    struct StalledSource;

    #[async_trait]
    impl ImplicitTokenSource for StalledSource {
        async fn get_implicit_token(&self, _client_id_hint: Option<&str>, _scope: &str) -> Result<ResolvedToken> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            anyhow::bail!("metadata endpoint unreachable")
        }
    }

    #[tokio::test]
    async fn test_forced_identity_does_not_wait_on_stalled_fetch() {
        let probe = PlatformProbe::resolved(false);

        let credential = tokio::time::timeout(
            FORCED_VALIDATION_TIMEOUT + Duration::from_secs(3),
            resolve_implicit_identity_credential(&probe, &StalledSource, "https://acct.example.com/", None, true),
        )
        .await
        .expect("forced resolution should be bounded");

        assert_eq!(credential, Some(Credential::implicit(None)));
    }

    #[tokio::test]
    async fn test_has_usable_implicit_identity_swallows_errors() {
        let failing = source(false);
        assert!(!has_usable_implicit_identity(&failing, "https://acct.example.com/", None, true).await);
        assert!(!has_usable_implicit_identity(&failing, "https://acct.example.com/", None, false).await);
        assert!(!has_usable_implicit_identity(&failing, "not an endpoint", None, true).await);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    }
}
