//! Transport options with builder pattern
//!
//! Callers pass a partial [`TransportOptions`]; the builder computes a base
//! [`ConnectionPolicy`] from the endpoint and settings and lets every value
//! the caller did set take precedence.

use std::time::Duration;

const USER_AGENT: &str = concat!("docdb-auth/", env!("CARGO_PKG_VERSION"));

/// Caller-supplied transport overrides; `None` keeps the computed default
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    pub proxy: Option<String>,
    pub user_agent_suffix: Option<String>,
    pub enable_endpoint_discovery: Option<bool>,
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub preferred_locations: Option<Vec<String>>,
}

/// Effective connection settings of a built client
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionPolicy {
    /// Whether server certificates are verified; only meaningful for https
    pub tls_verification: bool,
    pub proxy: Option<String>,
    pub enable_endpoint_discovery: bool,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub preferred_locations: Vec<String>,
}

impl ConnectionPolicy {
    /// Defaults before caller overrides are applied
    ///
    /// The emulator serves a self-signed certificate and has a single region,
    /// so it gets neither verification nor endpoint discovery.
    pub fn base(is_secure: bool, is_emulator: bool, strict_ssl: bool, proxy: Option<String>) -> Self {
        let tls_verification = if is_secure { !is_emulator && strict_ssl } else { true };

        Self {
            tls_verification,
            proxy,
            enable_endpoint_discovery: !is_emulator,
            user_agent: USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            preferred_locations: Vec::new(),
        }
    }

    pub fn merge(mut self, options: &TransportOptions) -> Self {
        if let Some(proxy) = &options.proxy {
            self.proxy = Some(proxy.clone());
        }
        if let Some(suffix) = &options.user_agent_suffix {
            self.user_agent = format!("{} {}", self.user_agent, suffix);
        }
        if let Some(discovery) = options.enable_endpoint_discovery {
            self.enable_endpoint_discovery = discovery;
        }
        if let Some(timeout) = options.request_timeout {
            self.request_timeout = timeout;
        }
        if let Some(timeout) = options.connect_timeout {
            self.connect_timeout = timeout;
        }
        if let Some(locations) = &options.preferred_locations {
            self.preferred_locations = locations.clone();
        }
        self
    }
}

impl TransportOptions {
    pub fn builder() -> TransportOptionsBuilder {
        TransportOptionsBuilder::new()
    }
}

/// Builder for TransportOptions
#[derive(Debug, Default)]
pub struct TransportOptionsBuilder {
    options: TransportOptions,
}

impl TransportOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route all requests through a proxy
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.options.proxy = Some(proxy.into());
        self
    }

    /// Append to the default user agent
    pub fn user_agent_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.options.user_agent_suffix = Some(suffix.into());
        self
    }

    pub fn endpoint_discovery(mut self, enabled: bool) -> Self {
        self.options.enable_endpoint_discovery = Some(enabled);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    pub fn preferred_locations(mut self, locations: Vec<String>) -> Self {
        self.options.preferred_locations = Some(locations);
        self
    }

    pub fn build(self) -> TransportOptions {
        self.options
    }
}
