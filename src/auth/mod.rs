//! Credential resolution for database accounts
//!
//! Decides how to authenticate against an endpoint and produces tokens on
//! demand for identity-based credentials.

pub mod credentials;
pub mod environment;
pub mod error;
pub mod implicit;
pub mod interactive;
pub mod resolver;
pub mod token;

pub use credentials::{
    AccountConnectionString, Credential, CredentialKind, select_key_credential, select_non_key_credentials,
};
pub use environment::{PlatformProbe, is_running_on_platform, platform_probe};
pub use error::{AuthError, CredentialFailure};
pub use implicit::{
    ImdsTokenSource, ImplicitTokenSource, has_usable_implicit_identity, resolve_implicit_identity_credential,
    scope_for_endpoint,
};
pub use interactive::{
    CredentialPrompt, InteractiveSession, InteractiveSessionProvider, PasswordGrantSessionProvider, SessionRequest,
};
pub use resolver::{CredentialOptions, collect_credentials};
pub use token::{ResolvedToken, TokenAcquirer, TokenProvider, now_epoch_ms};
