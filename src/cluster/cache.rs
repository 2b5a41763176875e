//! In-memory cache of resolved cluster secrets
//!
//! Entries live as long as the process or until deleted. There is no expiry:
//! a failed connection deletes the entry, which forces the next access to
//! authenticate from scratch.

use super::connection_string::ClusterConnectionString;
use crate::auth::AuthError;
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

static CLUSTER_CREDENTIALS: Lazy<Arc<CredentialCache>> = Lazy::new(|| Arc::new(CredentialCache::new()));

/// Get the process-wide cluster credential cache
pub fn cluster_credentials() -> Arc<CredentialCache> {
    CLUSTER_CREDENTIALS.clone()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmulatorConfiguration {
    pub is_emulator: bool,
    pub disable_emulator_security: bool,
}

/// Resolved secret for one cluster, replaced wholesale on re-authentication
#[derive(Clone, PartialEq, Eq)]
pub struct CachedSecret {
    pub cluster_id: String,
    pub connection_string_raw: String,
    pub connection_string_with_password: Option<String>,
    pub username: String,
    pub emulator_config: Option<EmulatorConfiguration>,
}

impl std::fmt::Debug for CachedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSecret")
            .field("cluster_id", &self.cluster_id)
            .field("username", &self.username)
            .field("has_password", &self.connection_string_with_password.is_some())
            .field("emulator_config", &self.emulator_config)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct CredentialCache {
    entries: RwLock<HashMap<String, CachedSecret>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store credentials for a cluster, overwriting any previous entry
    ///
    /// A malformed connection string leaves the cache untouched.
    pub fn set_credentials(
        &self,
        cluster_id: &str,
        connection_string: &str,
        username: &str,
        password: &str,
        emulator_config: Option<EmulatorConfiguration>,
    ) -> Result<(), AuthError> {
        let parsed = ClusterConnectionString::parse(connection_string)?;
        let secret = CachedSecret {
            cluster_id: cluster_id.to_string(),
            connection_string_raw: connection_string.to_string(),
            connection_string_with_password: Some(parsed.with_credentials(username, password)),
            username: username.to_string(),
            emulator_config,
        };

        self.write().insert(cluster_id.to_string(), secret);
        debug!("Stored credentials for cluster {} (user {})", cluster_id, username);
        Ok(())
    }

    pub fn get_connection_string_with_password(&self, cluster_id: &str) -> Option<String> {
        self.read()
            .get(cluster_id)
            .and_then(|secret| secret.connection_string_with_password.clone())
    }

    pub fn has_credentials(&self, cluster_id: &str) -> bool {
        self.read().contains_key(cluster_id)
    }

    pub fn get_emulator_configuration(&self, cluster_id: &str) -> Option<EmulatorConfiguration> {
        self.read().get(cluster_id).and_then(|secret| secret.emulator_config)
    }

    pub fn get_credentials(&self, cluster_id: &str) -> Option<CachedSecret> {
        self.read().get(cluster_id).cloned()
    }

    pub fn get_username(&self, cluster_id: &str) -> Option<String> {
        self.read().get(cluster_id).map(|secret| secret.username.clone())
    }

    pub fn delete_credentials(&self, cluster_id: &str) {
        if self.write().remove(cluster_id).is_some() {
            debug!("Deleted credentials for cluster {}", cluster_id);
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Every mutation replaces a whole entry, so a poisoned map is still consistent
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CachedSecret>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CachedSecret>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
