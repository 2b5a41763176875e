//! Layered token acquisition across identity credentials
//!
//! Credentials are tried in three strictly ordered phases:
//!
//! 1. the preferred credential, allowed to prompt
//! 2. every remaining credential, silently and sequentially
//! 3. one forced interactive retry, if any interactive credential exists
//!
//! Only when all three fail does the caller see an error, carrying every
//! recorded failure.

use super::credentials::{Credential, CredentialKind};
use super::error::{AuthError, CredentialFailure};
use super::implicit::ImplicitTokenSource;
use super::interactive::{InteractiveSessionProvider, SessionRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Bearer token with its expiry
///
/// `expires_at_epoch_ms == 0` means the source did not report an expiry. Treat
/// it as "revalidate before reuse", not as an expired token.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub token: String,
    pub expires_at_epoch_ms: u64,
}

impl ResolvedToken {
    pub fn new(token: impl Into<String>, expires_at_epoch_ms: u64) -> Self {
        Self {
            token: token.into(),
            expires_at_epoch_ms,
        }
    }

    pub fn has_known_expiry(&self) -> bool {
        self.expires_at_epoch_ms != 0
    }

    /// Whether the token must be fetched again before use at `now_epoch_ms`
    pub fn needs_revalidation(&self, now_epoch_ms: u64) -> bool {
        !self.has_known_expiry() || self.expires_at_epoch_ms <= now_epoch_ms
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if !self.has_known_expiry() {
            return None;
        }
        DateTime::from_timestamp_millis(i64::try_from(self.expires_at_epoch_ms).ok()?)
    }
}

impl std::fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("token", &"<redacted>")
            .field("expires_at_epoch_ms", &self.expires_at_epoch_ms)
            .finish()
    }
}

/// Current time in epoch milliseconds
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Produces bearer tokens on demand, installed into clients by the builder
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire_token(&self, scopes: &[String]) -> Result<ResolvedToken, AuthError>;
}

/// Multi-credential fallback engine
///
/// Holds no mutable state, so concurrent calls for different scopes do not
/// interfere with each other.
#[derive(Clone)]
pub struct TokenAcquirer {
    credentials: Vec<Credential>,
    interactive: Arc<dyn InteractiveSessionProvider>,
    implicit: Arc<dyn ImplicitTokenSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Preferred,
    Silent,
    ForcedInteractive,
}

impl TokenAcquirer {
    /// Key credentials in `credentials` are ignored
    pub fn new(
        credentials: Vec<Credential>,
        interactive: Arc<dyn InteractiveSessionProvider>,
        implicit: Arc<dyn ImplicitTokenSource>,
    ) -> Self {
        let credentials = credentials.into_iter().filter(|c| !c.is_key()).collect();
        Self {
            credentials,
            interactive,
            implicit,
        }
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    async fn try_credential(
        &self,
        credential: &Credential,
        scopes: &[String],
        phase: Phase,
    ) -> Result<ResolvedToken, CredentialFailure> {
        debug!("Trying {} ({:?} phase)", credential.kind(), phase);

        match credential {
            Credential::Interactive { tenant_hint } => {
                let request = match phase {
                    Phase::Preferred => SessionRequest::prompt_if_needed(),
                    Phase::Silent => SessionRequest::silent(),
                    Phase::ForcedInteractive => SessionRequest::forced(),
                };
                match self
                    .interactive
                    .get_session(scopes, tenant_hint.as_deref(), request)
                    .await
                {
                    // Sessions do not report expiry
                    Ok(Some(session)) => Ok(ResolvedToken::new(session.access_token, 0)),
                    Ok(None) => Err(CredentialFailure::new(
                        CredentialKind::Interactive,
                        "no signed-in session",
                    )),
                    Err(e) => Err(CredentialFailure::new(CredentialKind::Interactive, format!("{:#}", e))),
                }
            }
            Credential::Implicit { identity_hint } => {
                let Some(scope) = scopes.first() else {
                    return Err(CredentialFailure::new(CredentialKind::Implicit, "no scope requested"));
                };
                self.implicit
                    .get_implicit_token(identity_hint.as_deref(), scope)
                    .await
                    .map_err(|e| CredentialFailure::new(CredentialKind::Implicit, format!("{:#}", e)))
            }
            Credential::Key { .. } => Err(CredentialFailure::new(
                CredentialKind::Key,
                "account keys cannot produce tokens",
            )),
        }
    }
}

#[async_trait]
impl TokenProvider for TokenAcquirer {
    async fn acquire_token(&self, scopes: &[String]) -> Result<ResolvedToken, AuthError> {
        let mut failures = Vec::new();

        let Some((preferred, remaining)) = self.credentials.split_first() else {
            return Err(AuthError::AllCredentialsExhausted {
                scopes: scopes.to_vec(),
                failures,
            });
        };

        match self.try_credential(preferred, scopes, Phase::Preferred).await {
            Ok(token) => return Ok(token),
            Err(failure) => {
                debug!("Preferred credential failed: {}", failure);
                failures.push(failure);
            }
        }

        for credential in remaining {
            match self.try_credential(credential, scopes, Phase::Silent).await {
                Ok(token) => {
                    info!("Acquired token with fallback credential: {}", credential.kind());
                    return Ok(token);
                }
                Err(failure) => {
                    debug!("Fallback credential failed: {}", failure);
                    failures.push(failure);
                }
            }
        }

        let interactive = self
            .credentials
            .iter()
            .find(|c| c.kind() == CredentialKind::Interactive);
        if let Some(credential) = interactive {
            info!("All credentials failed, retrying interactive sign-in");
            match self
                .try_credential(credential, scopes, Phase::ForcedInteractive)
                .await
            {
                Ok(token) => return Ok(token),
                Err(failure) => failures.push(failure),
            }
        }

        let err = AuthError::AllCredentialsExhausted {
            scopes: scopes.to_vec(),
            failures,
        };
        warn!("{}", err);
        Err(err)
    }
}
