use super::error::AuthError;
use log::debug;

/// A way to authenticate against a database account
///
/// The three kinds share no behavior; they only describe how a key or a
/// token is obtained.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static shared account key
    Key { key: String },
    /// Delegates to an interactive sign-in surface, optionally scoped to a tenant
    Interactive { tenant_hint: Option<String> },
    /// Platform-assigned identity; the process holds no secret material
    Implicit { identity_hint: Option<String> },
}

/// Discriminant of [`Credential`], used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Key,
    Interactive,
    Implicit,
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialKind::Key => write!(f, "account key"),
            CredentialKind::Interactive => write!(f, "interactive identity"),
            CredentialKind::Implicit => write!(f, "implicit identity"),
        }
    }
}

impl Credential {
    pub fn key(key: impl Into<String>) -> Self {
        Credential::Key { key: key.into() }
    }

    pub fn interactive(tenant_hint: Option<String>) -> Self {
        Credential::Interactive { tenant_hint }
    }

    pub fn implicit(identity_hint: Option<String>) -> Self {
        Credential::Implicit { identity_hint }
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::Key { .. } => CredentialKind::Key,
            Credential::Interactive { .. } => CredentialKind::Interactive,
            Credential::Implicit { .. } => CredentialKind::Implicit,
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, Credential::Key { .. })
    }
}

// Keys never end up in logs
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Key { .. } => f.debug_struct("Key").field("key", &"<redacted>").finish(),
            Credential::Interactive { tenant_hint } => f
                .debug_struct("Interactive")
                .field("tenant_hint", tenant_hint)
                .finish(),
            Credential::Implicit { identity_hint } => f
                .debug_struct("Implicit")
                .field("identity_hint", identity_hint)
                .finish(),
        }
    }
}

/// Returns the first (and by invariant the only) key in the list
pub fn select_key_credential(credentials: &[Credential]) -> Option<&str> {
    credentials.iter().find_map(|credential| match credential {
        Credential::Key { key } => Some(key.as_str()),
        _ => None,
    })
}

/// Returns every non-key credential, preserving preference order
pub fn select_non_key_credentials(credentials: &[Credential]) -> Vec<Credential> {
    credentials
        .iter()
        .filter(|credential| !credential.is_key())
        .cloned()
        .collect()
}

/// Account connection string of the form
/// `AccountEndpoint=https://acct.example.com:443/;AccountKey=abc==;`
#[derive(Clone, PartialEq, Eq)]
pub struct AccountConnectionString {
    pub endpoint: String,
    pub key: String,
    pub database: Option<String>,
}

impl AccountConnectionString {
    pub fn parse(connection_string: &str) -> Result<Self, AuthError> {
        let mut endpoint = None;
        let mut key = None;
        let mut database = None;

        for part in connection_string.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            // Keys end in base64 padding, so only the first '=' separates name from value
            let Some((name, value)) = part.split_once('=') else {
                return Err(AuthError::InvalidConnectionString(format!(
                    "segment '{}' is not a name=value pair",
                    name_only(part)
                )));
            };

            match name.trim().to_ascii_lowercase().as_str() {
                "accountendpoint" => endpoint = Some(value.trim().to_string()),
                "accountkey" => key = Some(value.trim().to_string()),
                "database" => database = Some(value.trim().to_string()),
                other => debug!("Ignoring connection string segment: {}", other),
            }
        }

        let endpoint = endpoint
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::InvalidConnectionString("missing AccountEndpoint".to_string()))?;
        let key = key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::InvalidConnectionString("missing AccountKey".to_string()))?;

        Ok(Self {
            endpoint,
            key,
            database,
        })
    }

    pub fn credential(&self) -> Credential {
        Credential::key(self.key.clone())
    }
}

impl std::fmt::Debug for AccountConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConnectionString")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

fn name_only(segment: &str) -> &str {
    // Avoid echoing secret material back in error messages
    segment.get(..segment.len().min(16)).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_key_credential_returns_first_key() {
        let credentials = vec![
            Credential::interactive(None),
            Credential::key("secret"),
            Credential::implicit(None),
        ];
        assert_eq!(select_key_credential(&credentials), Some("secret"));
        assert_eq!(select_key_credential(&[Credential::interactive(None)]), None);
    }

    #[test]
    fn test_select_non_key_preserves_order() {
        let credentials = vec![
            Credential::implicit(Some("client-a".to_string())),
            Credential::key("secret"),
            Credential::interactive(Some("tenant".to_string())),
        ];

        let selected = select_non_key_credentials(&credentials);
        assert_eq!(
            selected,
            vec![
                Credential::implicit(Some("client-a".to_string())),
                Credential::interactive(Some("tenant".to_string())),
            ]
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", Credential::key("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_parse_account_connection_string() {
        let parsed = AccountConnectionString::parse(
            "AccountEndpoint=https://acct.example.com:443/;AccountKey=abc/def==;",
        )
        .unwrap();
        assert_eq!(parsed.endpoint, "https://acct.example.com:443/");
        assert_eq!(parsed.key, "abc/def==");
        assert_eq!(parsed.database, None);
        assert_eq!(parsed.credential(), Credential::key("abc/def=="));
    }

    #[test]
    fn test_parse_account_connection_string_is_case_insensitive() {
        let parsed = AccountConnectionString::parse(
            "accountkey=k1==; Database=orders; ACCOUNTENDPOINT=https://acct.example.com/",
        )
        .unwrap();
        assert_eq!(parsed.endpoint, "https://acct.example.com/");
        assert_eq!(parsed.key, "k1==");
        assert_eq!(parsed.database.as_deref(), Some("orders"));
    }

    #[test]
    fn test_parse_account_connection_string_missing_key() {
        let err = AccountConnectionString::parse("AccountEndpoint=https://acct.example.com/")
            .unwrap_err();
        assert!(err.to_string().contains("AccountKey"));
    }
}
