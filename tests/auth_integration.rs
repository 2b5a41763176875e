//! Integration tests for credential resolution and token acquisition
//!
//! Drives the fallback engine through the client builder with scripted
//! session providers and implicit token sources.

use anyhow::Result;
use async_trait::async_trait;
use docdb_auth::api::{AuthMode, Authorization, ClientAuth, ClientBuilder, TransportOptions};
use docdb_auth::auth::{
    AuthError, Credential, CredentialKind, CredentialOptions, ImplicitTokenSource, InteractiveSession,
    InteractiveSessionProvider, PlatformProbe, ResolvedToken, SessionRequest, TokenAcquirer, TokenProvider,
    collect_credentials, resolve_implicit_identity_credential,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ENDPOINT: &str = "https://acct.example.com:443/";

fn scopes() -> Vec<String> {
    vec!["https://acct.example.com/.default".to_string()]
}

/// Records every session request; tenants listed in `forced_only` succeed
/// only with a forced session, those in `silent_ok` succeed always.
#[derive(Default)]
struct ScriptedSessions {
    calls: Mutex<Vec<(Option<String>, SessionRequest)>>,
    forced_only: Vec<&'static str>,
    silent_ok: Vec<&'static str>,
}

impl ScriptedSessions {
    fn calls(&self) -> Vec<(Option<String>, SessionRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InteractiveSessionProvider for ScriptedSessions {
    async fn get_session(
        &self,
        _scopes: &[String],
        tenant_hint: Option<&str>,
        request: SessionRequest,
    ) -> Result<Option<InteractiveSession>> {
        self.calls
            .lock()
            .unwrap()
            .push((tenant_hint.map(str::to_string), request));

        let tenant = tenant_hint.unwrap_or_default();
        if self.silent_ok.contains(&tenant) {
            return Ok(Some(InteractiveSession {
                access_token: format!("token-{}", tenant),
                account: None,
            }));
        }
        if self.forced_only.contains(&tenant) && request.force_new_session {
            return Ok(Some(InteractiveSession {
                access_token: format!("forced-{}", tenant),
                account: None,
            }));
        }
        if request.may_prompt() {
            anyhow::bail!("user cancelled sign-in for {}", tenant);
        }
        Ok(None)
    }
}

struct ScriptedImplicit {
    calls: AtomicUsize,
    result: Option<(&'static str, u64)>,
}

impl ScriptedImplicit {
    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: None,
        }
    }

    fn returning(token: &'static str, expires_at_epoch_ms: u64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            result: Some((token, expires_at_epoch_ms)),
        }
    }
}

#[async_trait]
impl ImplicitTokenSource for ScriptedImplicit {
    async fn get_implicit_token(&self, _client_id_hint: Option<&str>, _scope: &str) -> Result<ResolvedToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.result {
            Some((token, expiry)) => Ok(ResolvedToken::new(token, expiry)),
            None => anyhow::bail!("no managed identity endpoint"),
        }
    }
}

/// Test that a failed preferred credential falls through to silent attempts in order
#[tokio::test]
async fn test_fallback_tries_remaining_credentials_silently() {
    let sessions = Arc::new(ScriptedSessions {
        forced_only: vec!["a"],
        silent_ok: vec!["c"],
        ..Default::default()
    });
    let implicit = Arc::new(ScriptedImplicit::failing());
    let acquirer = TokenAcquirer::new(
        vec![
            Credential::interactive(Some("a".to_string())),
            Credential::implicit(None),
            Credential::interactive(Some("c".to_string())),
        ],
        sessions.clone(),
        implicit.clone(),
    );

    let token = acquirer.acquire_token(&scopes()).await.unwrap();
    assert_eq!(token.token, "token-c");
    assert_eq!(token.expires_at_epoch_ms, 0);

    // A was asked once with prompting allowed, C once silently, no forced retry
    let calls = sessions.calls();
    assert_eq!(
        calls,
        vec![
            (Some("a".to_string()), SessionRequest::prompt_if_needed()),
            (Some("c".to_string()), SessionRequest::silent()),
        ]
    );
    assert_eq!(implicit.calls.load(Ordering::SeqCst), 1);
}

/// Test that the first interactive credential gets one forced retry after all else fails
#[tokio::test]
async fn test_forced_retry_of_first_interactive_credential() {
    let sessions = Arc::new(ScriptedSessions {
        forced_only: vec!["a"],
        ..Default::default()
    });
    let acquirer = TokenAcquirer::new(
        vec![
            Credential::implicit(None),
            Credential::interactive(Some("a".to_string())),
        ],
        sessions.clone(),
        Arc::new(ScriptedImplicit::failing()),
    );

    let token = acquirer.acquire_token(&scopes()).await.unwrap();
    assert_eq!(token.token, "forced-a");

    let calls = sessions.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, SessionRequest::silent());
    assert_eq!(calls[1].1, SessionRequest::forced());
}

/// Test that exhaustion names every credential kind that was attempted
#[tokio::test]
async fn test_exhaustion_reports_every_failure() {
    let sessions = Arc::new(ScriptedSessions::default());
    let acquirer = TokenAcquirer::new(
        vec![Credential::interactive(None), Credential::implicit(None)],
        sessions.clone(),
        Arc::new(ScriptedImplicit::failing()),
    );

    let err = acquirer.acquire_token(&scopes()).await.unwrap_err();
    let kinds: Vec<CredentialKind> = err.failures().iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            CredentialKind::Interactive,
            CredentialKind::Implicit,
            CredentialKind::Interactive
        ]
    );

    let message = err.to_string();
    assert!(message.contains("interactive identity: "));
    assert!(message.contains("implicit identity: no managed identity endpoint"));
    assert!(message.contains("https://acct.example.com/.default"));

    // Preferred, then the forced retry; exactly one extra prompt
    assert_eq!(sessions.calls().len(), 2);
}

/// Test that lists without an interactive credential never prompt
#[tokio::test]
async fn test_implicit_only_exhaustion_skips_forced_retry() {
    let implicit = Arc::new(ScriptedImplicit::failing());
    let sessions = Arc::new(ScriptedSessions::default());
    let acquirer = TokenAcquirer::new(vec![Credential::implicit(None)], sessions.clone(), implicit.clone());

    let err = acquirer.acquire_token(&scopes()).await.unwrap_err();
    assert!(matches!(err, AuthError::AllCredentialsExhausted { .. }));
    assert_eq!(err.failures().len(), 1);
    assert!(sessions.calls().is_empty());
    assert_eq!(implicit.calls.load(Ordering::SeqCst), 1);
}

/// Test that an account key wins and no token source is touched
#[tokio::test]
async fn test_key_wins_and_token_sources_are_never_called() {
    let sessions = Arc::new(ScriptedSessions::default());
    let implicit = Arc::new(ScriptedImplicit::returning("abc", 0));
    let builder = ClientBuilder::new(sessions.clone(), implicit.clone());

    let client = builder
        .build(
            ENDPOINT,
            &[
                Credential::interactive(None),
                Credential::key("secret-key"),
                Credential::implicit(None),
            ],
            false,
            TransportOptions::default(),
        )
        .unwrap();

    assert_eq!(client.auth_mode(), AuthMode::Key);
    assert!(client.token_provider().is_none());
    assert_eq!(
        client.authorization(&scopes()).await.unwrap(),
        Authorization::Key("secret-key".to_string())
    );
    assert!(sessions.calls().is_empty());
    assert_eq!(implicit.calls.load(Ordering::SeqCst), 0);
}

/// Test that key and token auth cannot be configured together
#[test]
fn test_key_and_provider_together_are_rejected() {
    let provider: Arc<dyn TokenProvider> = Arc::new(TokenAcquirer::new(
        vec![Credential::implicit(None)],
        Arc::new(ScriptedSessions::default()),
        Arc::new(ScriptedImplicit::failing()),
    ));
    let result = ClientAuth::from_parts(Some("k".to_string()), Some(provider));
    assert!(matches!(result, Err(AuthError::MutualExclusivityViolation)));
}

/// Test that building with no credentials fails before any I/O
#[test]
fn test_no_credentials_fails_without_io() {
    let sessions = Arc::new(ScriptedSessions::default());
    let implicit = Arc::new(ScriptedImplicit::returning("abc", 0));
    let builder = ClientBuilder::new(sessions.clone(), implicit.clone());

    let err = builder
        .build(ENDPOINT, &[], false, TransportOptions::default())
        .unwrap_err();
    assert!(matches!(err, AuthError::NoCredential { .. }));
    assert!(sessions.calls().is_empty());
    assert_eq!(implicit.calls.load(Ordering::SeqCst), 0);
}

/// Test that malformed endpoints are rejected by the builder
#[test]
fn test_invalid_endpoint_is_rejected() {
    let builder = ClientBuilder::new(
        Arc::new(ScriptedSessions::default()),
        Arc::new(ScriptedImplicit::failing()),
    );
    let err = builder
        .build("not a url", &[Credential::key("k")], false, TransportOptions::default())
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidEndpoint { .. }));
}

/// Test the implicit identity from resolution through token acquisition
#[tokio::test]
async fn test_implicit_identity_end_to_end() {
    let probe = PlatformProbe::resolved(true);
    let implicit = Arc::new(ScriptedImplicit::returning("abc", 0));

    let credential = resolve_implicit_identity_credential(&probe, implicit.as_ref(), ENDPOINT, None, false)
        .await
        .expect("implicit identity should be offered");
    assert_eq!(credential, Credential::implicit(None));

    let client = ClientBuilder::new(Arc::new(ScriptedSessions::default()), implicit.clone())
        .build(ENDPOINT, &[credential], false, TransportOptions::default())
        .unwrap();
    assert_eq!(client.auth_mode(), AuthMode::Token);

    let provider = client.token_provider().expect("token client");
    let token = provider.acquire_token(&client.default_scopes().unwrap()).await.unwrap();
    assert_eq!(token.token, "abc");
    assert_eq!(token.expires_at_epoch_ms, 0);
    assert!(!token.has_known_expiry());

    // One validation fetch, one real fetch
    assert_eq!(implicit.calls.load(Ordering::SeqCst), 2);
}

/// Test that off-platform resolution skips validation unless forced
#[tokio::test]
async fn test_off_platform_skips_implicit_validation() {
    let probe = PlatformProbe::resolved(false);
    let implicit = ScriptedImplicit::returning("abc", 0);

    let credential = resolve_implicit_identity_credential(&probe, &implicit, ENDPOINT, None, false).await;
    assert!(credential.is_none());
    assert_eq!(implicit.calls.load(Ordering::SeqCst), 0);

    let forced = resolve_implicit_identity_credential(&probe, &implicit, ENDPOINT, Some("client-1"), true).await;
    assert_eq!(forced, Some(Credential::implicit(Some("client-1".to_string()))));
}

/// Test credential ordering for forced implicit identity and key short-circuit
#[tokio::test]
async fn test_collect_credentials_orders_forced_implicit_first() {
    let probe = PlatformProbe::resolved(false);
    let implicit = ScriptedImplicit::failing();
    let options = CredentialOptions {
        tenant_id: Some("t1".to_string()),
        identity_client_id: None,
        force_implicit: true,
    };

    let credentials = collect_credentials(ENDPOINT, None, &options, &probe, &implicit).await;
    let kinds: Vec<CredentialKind> = credentials.iter().map(Credential::kind).collect();
    assert_eq!(kinds, vec![CredentialKind::Implicit, CredentialKind::Interactive]);

    let keyed = collect_credentials(ENDPOINT, Some("k".to_string()), &options, &probe, &implicit).await;
    assert_eq!(keyed, vec![Credential::key("k")]);
}

/// Test that concurrent acquisitions for different scopes do not interfere
#[tokio::test]
async fn test_concurrent_acquisitions_are_independent() {
    let sessions = Arc::new(ScriptedSessions {
        silent_ok: vec!["c"],
        ..Default::default()
    });
    let acquirer = Arc::new(TokenAcquirer::new(
        vec![Credential::interactive(Some("c".to_string()))],
        sessions.clone(),
        Arc::new(ScriptedImplicit::failing()),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let acquirer = acquirer.clone();
            tokio::spawn(async move {
                let scopes = vec![format!("https://acct{}.example.com/.default", i)];
                acquirer.acquire_token(&scopes).await
            })
        })
        .collect();

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.token, "token-c");
    }
    assert_eq!(sessions.calls().len(), 8);
}

fn builder() -> ClientBuilder {
    ClientBuilder::new(
        Arc::new(ScriptedSessions::default()),
        Arc::new(ScriptedImplicit::failing()),
    )
}

/// Test that emulator clients skip certificate checks and endpoint discovery
#[test]
fn test_emulator_build_disables_verification_and_discovery() {
    let client = builder()
        .build(
            "https://localhost:8081/",
            &[Credential::key("emulator-key")],
            true,
            TransportOptions::default(),
        )
        .unwrap();

    let policy = client.connection_policy();
    assert!(!policy.tls_verification);
    assert!(!policy.enable_endpoint_discovery);
}

/// Test that relaxed SSL settings reach the built client
#[test]
fn test_relaxed_ssl_applies_to_secure_accounts() {
    let client = builder()
        .strict_ssl(false)
        .build(ENDPOINT, &[Credential::key("k")], false, TransportOptions::default())
        .unwrap();

    let policy = client.connection_policy();
    assert!(!policy.tls_verification);
    assert!(policy.enable_endpoint_discovery);

    let strict = builder()
        .build(ENDPOINT, &[Credential::key("k")], false, TransportOptions::default())
        .unwrap();
    assert!(strict.connection_policy().tls_verification);
}

/// Test that certificate settings do not apply to plain http endpoints
#[test]
fn test_plain_http_keeps_verification_flag() {
    let client = builder()
        .strict_ssl(false)
        .build("http://localhost:8081/", &[Credential::key("k")], true, TransportOptions::default())
        .unwrap();

    let policy = client.connection_policy();
    assert!(policy.tls_verification);
    assert!(!policy.enable_endpoint_discovery);
}

/// Test that caller transport options take precedence in the built client
#[test]
fn test_caller_options_override_builder_defaults() {
    let options = TransportOptions::builder()
        .proxy("http://caller-proxy:8080")
        .endpoint_discovery(true)
        .request_timeout(Duration::from_secs(5))
        .build();

    let client = builder()
        .proxy(Some("http://builder-proxy:3128".to_string()))
        .build("https://localhost:8081/", &[Credential::key("k")], true, options)
        .unwrap();

    let policy = client.connection_policy();
    assert_eq!(policy.proxy.as_deref(), Some("http://caller-proxy:8080"));
    assert!(policy.enable_endpoint_discovery);
    assert_eq!(policy.request_timeout, Duration::from_secs(5));
    assert!(!policy.tls_verification);
}

/// Test that the builder proxy applies when the caller sets none
#[test]
fn test_builder_proxy_used_without_caller_proxy() {
    let client = builder()
        .proxy(Some("http://builder-proxy:3128".to_string()))
        .build(ENDPOINT, &[Credential::key("k")], false, TransportOptions::default())
        .unwrap();

    assert_eq!(
        client.connection_policy().proxy.as_deref(),
        Some("http://builder-proxy:3128")
    );
}

/// Test that an unusable proxy surfaces as a transport error
#[test]
fn test_invalid_proxy_is_a_transport_error() {
    let options = TransportOptions::builder().proxy("http://bad proxy:3128").build();

    let err = builder()
        .build(ENDPOINT, &[Credential::key("k")], false, options)
        .unwrap_err();
    assert!(matches!(err, AuthError::Transport(_)));
}
