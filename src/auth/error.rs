//! Error types surfaced by the authentication subsystem
//!
//! Probe and implicit-identity failures never appear here: they are
//! downgraded to `false`/`None` at the layer that produced them. Only
//! terminal conditions reach the caller.

use super::credentials::CredentialKind;
use thiserror::Error;

/// A single credential's failure, recorded by the token engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFailure {
    pub kind: CredentialKind,
    pub message: String,
}

impl CredentialFailure {
    pub fn new(kind: CredentialKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CredentialFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The builder was handed neither a key nor an identity credential
    #[error("No credentials available for {endpoint}; supply an account key or sign in")]
    NoCredential { endpoint: String },

    /// Every strategy of the token engine failed
    #[error(
        "Failed to acquire a token for scopes [{}]: {}",
        scopes.join(", "),
        join_failures(failures)
    )]
    AllCredentialsExhausted {
        scopes: Vec<String>,
        failures: Vec<CredentialFailure>,
    },

    /// A client was about to be configured for key and token auth at once.
    /// This indicates a bug in the caller, not a user error.
    #[error("Key and token authentication were both selected for the same client")]
    MutualExclusivityViolation,

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Failed to configure HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}

fn join_failures(failures: &[CredentialFailure]) -> String {
    if failures.is_empty() {
        return "no credential could be tried".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl AuthError {
    /// Failures recorded before exhaustion, empty for every other variant
    pub fn failures(&self) -> &[CredentialFailure] {
        match self {
            AuthError::AllCredentialsExhausted { failures, .. } => failures,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_lists_every_failure() {
        let err = AuthError::AllCredentialsExhausted {
            scopes: vec!["https://acct.example.com/.default".to_string()],
            failures: vec![
                CredentialFailure::new(CredentialKind::Interactive, "user cancelled"),
                CredentialFailure::new(CredentialKind::Implicit, "no identity endpoint"),
            ],
        };

        let message = err.to_string();
        assert!(message.contains("https://acct.example.com/.default"));
        assert!(message.contains("interactive identity: user cancelled"));
        assert!(message.contains("implicit identity: no identity endpoint"));
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn test_exhausted_without_failures() {
        let err = AuthError::AllCredentialsExhausted {
            scopes: vec![],
            failures: vec![],
        };
        assert!(err.to_string().contains("no credential could be tried"));
    }
}
