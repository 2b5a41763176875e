//! Interactive sign-in surface
//!
//! The token engine only sees [`InteractiveSessionProvider`]. The terminal
//! implementation here prompts for a username and password and exchanges
//! them at the identity authority, keeping the session in memory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Tenant used when the credential carries no hint
pub const DEFAULT_TENANT: &str = "organizations";

/// How far a session may be from expiry and still be handed out
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Options for a session request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionRequest {
    /// Prompt the user if no signed-in session exists
    pub create_if_none: bool,
    /// Prompt the user even if a session exists
    pub force_new_session: bool,
}

impl SessionRequest {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn prompt_if_needed() -> Self {
        Self {
            create_if_none: true,
            force_new_session: false,
        }
    }

    pub fn forced() -> Self {
        Self {
            create_if_none: true,
            force_new_session: true,
        }
    }

    pub fn may_prompt(&self) -> bool {
        self.create_if_none || self.force_new_session
    }
}

#[derive(Clone)]
pub struct InteractiveSession {
    pub access_token: String,
    pub account: Option<String>,
}

impl std::fmt::Debug for InteractiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveSession")
            .field("access_token", &"<redacted>")
            .field("account", &self.account)
            .finish()
    }
}

/// External interactive sign-in capability
///
/// `Ok(None)` means no session and none was created (e.g. silent request
/// while signed out).
#[async_trait]
pub trait InteractiveSessionProvider: Send + Sync {
    async fn get_session(
        &self,
        scopes: &[String],
        tenant_hint: Option<&str>,
        request: SessionRequest,
    ) -> Result<Option<InteractiveSession>>;
}

/// Asks a human for a username and password
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    async fn prompt_username(&self, prompt: &str, default: Option<&str>) -> Result<String>;
    async fn prompt_password(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
struct CachedSession {
    session: InteractiveSession,
    expires_at: SystemTime,
}

/// Resource-owner password grant against the identity authority
pub struct PasswordGrantSessionProvider {
    http_client: reqwest::Client,
    authority: String,
    client_id: String,
    prompt: Arc<dyn CredentialPrompt>,
    sessions: RwLock<HashMap<String, CachedSession>>,
}

impl PasswordGrantSessionProvider {
    pub fn new(client_id: impl Into<String>, prompt: Arc<dyn CredentialPrompt>) -> Self {
        Self::with_authority(DEFAULT_AUTHORITY, client_id, prompt)
    }

    pub fn with_authority(
        authority: impl Into<String>,
        client_id: impl Into<String>,
        prompt: Arc<dyn CredentialPrompt>,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            authority: authority.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            prompt,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every cached session, e.g. on sign-out
    pub async fn sign_out(&self) {
        self.sessions.write().await.clear();
        info!("Cleared interactive sessions");
    }

    fn session_key(scopes: &[String], tenant: &str) -> String {
        let mut sorted = scopes.to_vec();
        sorted.sort();
        format!("{}|{}", tenant, sorted.join(" "))
    }

    async fn cached_session(&self, key: &str) -> Option<InteractiveSession> {
        let sessions = self.sessions.read().await;
        let cached = sessions.get(key)?;
        let fresh = cached
            .expires_at
            .duration_since(SystemTime::now())
            .map(|remaining| remaining > EXPIRY_MARGIN)
            .unwrap_or(false);
        if fresh {
            Some(cached.session.clone())
        } else {
            debug!("Cached interactive session expired");
            None
        }
    }

    async fn sign_in(&self, scopes: &[String], tenant: &str) -> Result<CachedSession> {
        let username = self.prompt.prompt_username("Username", None).await?;
        let password = self.prompt.prompt_password("Password").await?;

        let token_url = format!("{}/{}/oauth2/v2.0/token", self.authority, tenant);
        let scope = scopes.join(" ");

        info!("Signing in {} at {}", username, token_url);

        let response = self
            .http_client
            .post(&token_url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.client_id.as_str()),
                ("scope", scope.as_str()),
                ("username", username.as_str()),
                ("password", password.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", token_url))?;

        debug!("Token request status: {}", response.status());

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Sign-in failed: {}", error_text);
        }

        let token_data: Value = response.json().await.context("Invalid token response")?;
        let access_token = token_data
            .get("access_token")
            .and_then(|t| t.as_str())
            .context("No access token in response")?;

        // Default to 1 hour if not provided
        let expires_in = token_data
            .get("expires_in")
            .and_then(|e| e.as_u64().or_else(|| e.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(3600);

        Ok(CachedSession {
            session: InteractiveSession {
                access_token: access_token.to_string(),
                account: Some(username),
            },
            expires_at: SystemTime::now() + Duration::from_secs(expires_in),
        })
    }
}

#[async_trait]
impl InteractiveSessionProvider for PasswordGrantSessionProvider {
    async fn get_session(
        &self,
        scopes: &[String],
        tenant_hint: Option<&str>,
        request: SessionRequest,
    ) -> Result<Option<InteractiveSession>> {
        let tenant = tenant_hint.unwrap_or(DEFAULT_TENANT);
        let key = Self::session_key(scopes, tenant);

        if !request.force_new_session {
            if let Some(session) = self.cached_session(&key).await {
                debug!("Using cached interactive session for tenant {}", tenant);
                return Ok(Some(session));
            }
        }

        if !request.may_prompt() {
            return Ok(None);
        }

        let cached = self.sign_in(scopes, tenant).await?;
        let session = cached.session.clone();
        self.sessions.write().await.insert(key, cached);
        info!("Signed in to tenant {}", tenant);
        Ok(Some(session))
    }
}
