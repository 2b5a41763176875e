use super::cache::{CredentialCache, EmulatorConfiguration};
use super::connection_string::ClusterConnectionString;
use crate::auth::CredentialPrompt;
use anyhow::{Context, Result};
use log::{info, warn};
use std::future::Future;
use std::sync::Arc;

/// Resolves cluster credentials once and reuses them from the cache
pub struct ClusterAuthenticator {
    cache: Arc<CredentialCache>,
    prompt: Arc<dyn CredentialPrompt>,
}

impl ClusterAuthenticator {
    pub fn new(cache: Arc<CredentialCache>, prompt: Arc<dyn CredentialPrompt>) -> Self {
        Self { cache, prompt }
    }

    pub fn cache(&self) -> &Arc<CredentialCache> {
        &self.cache
    }

    /// Connection string with credentials for `cluster_id`
    ///
    /// Prompts only when nothing is cached; the username prompt defaults to
    /// the one embedded in `connection_string`.
    pub async fn authenticate(
        &self,
        cluster_id: &str,
        connection_string: &str,
        emulator_config: Option<EmulatorConfiguration>,
    ) -> Result<String> {
        if let Some(cached) = self.cache.get_connection_string_with_password(cluster_id) {
            return Ok(cached);
        }

        let parsed = ClusterConnectionString::parse(connection_string)?;

        let username = self
            .prompt
            .prompt_username(&format!("Username for {}", parsed.hosts()), parsed.username())
            .await?;
        let username = username.trim().to_string();
        if username.is_empty() {
            anyhow::bail!("A username is required to connect to {}", parsed.hosts());
        }

        let password = self
            .prompt
            .prompt_password(&format!("Password for {}", username))
            .await?;

        self.cache
            .set_credentials(cluster_id, connection_string, &username, &password, emulator_config)?;
        info!("Authenticated cluster {} as {}", cluster_id, username);

        self.cache
            .get_connection_string_with_password(cluster_id)
            .context("Credentials vanished from the cache")
    }

    /// Run a connection attempt with authenticated credentials
    ///
    /// A failed attempt deletes the cached secret so the next call prompts again.
    pub async fn connect<F, Fut, T>(
        &self,
        cluster_id: &str,
        connection_string: &str,
        emulator_config: Option<EmulatorConfiguration>,
        attempt: F,
    ) -> Result<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let authenticated = self
            .authenticate(cluster_id, connection_string, emulator_config)
            .await?;

        match attempt(authenticated).await {
            Ok(connection) => Ok(connection),
            Err(e) => {
                warn!("Connection to cluster {} failed, clearing credentials: {:#}", cluster_id, e);
                self.cache.delete_credentials(cluster_id);
                Err(e)
            }
        }
    }

    /// Forget a cluster's credentials
    pub fn detach(&self, cluster_id: &str) {
        self.cache.delete_credentials(cluster_id);
        info!("Detached cluster {}", cluster_id);
    }
}
