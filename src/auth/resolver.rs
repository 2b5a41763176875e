//! Assembles the credential list for an account endpoint

use super::credentials::Credential;
use super::environment::PlatformProbe;
use super::implicit::{ImplicitTokenSource, resolve_implicit_identity_credential};
use log::debug;

/// Inputs that shape the credential list, usually read from settings
#[derive(Debug, Clone, Default)]
pub struct CredentialOptions {
    pub tenant_id: Option<String>,
    pub identity_client_id: Option<String>,
    /// Offer the implicit identity first and skip the platform probe
    pub force_implicit: bool,
}

/// Build the raw credential list for `endpoint`
///
/// A known key short-circuits everything else. Otherwise the interactive
/// identity is preferred, followed by the implicit identity when it proves
/// usable; forcing implicit identity swaps that order.
pub async fn collect_credentials(
    endpoint: &str,
    key: Option<String>,
    options: &CredentialOptions,
    probe: &PlatformProbe,
    implicit_source: &dyn ImplicitTokenSource,
) -> Vec<Credential> {
    if let Some(key) = key.filter(|k| !k.is_empty()) {
        debug!("Using account key for {}", endpoint);
        return vec![Credential::key(key)];
    }

    let interactive = Credential::interactive(options.tenant_id.clone());
    let implicit = resolve_implicit_identity_credential(
        probe,
        implicit_source,
        endpoint,
        options.identity_client_id.as_deref(),
        options.force_implicit,
    )
    .await;

    let credentials = match implicit {
        Some(implicit) if options.force_implicit => vec![implicit, interactive],
        Some(implicit) => vec![interactive, implicit],
        None => vec![interactive],
    };

    debug!(
        "Resolved {} credential(s) for {}: {:?}",
        credentials.len(),
        endpoint,
        credentials.iter().map(|c| c.kind()).collect::<Vec<_>>()
    );
    credentials
}
