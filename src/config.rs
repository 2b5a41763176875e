use crate::auth::CredentialOptions;
use crate::auth::environment::{DEFAULT_METADATA_ENDPOINT, PlatformProbe};
use crate::auth::implicit::DEFAULT_IDENTITY_ENDPOINT;
use crate::auth::interactive::DEFAULT_AUTHORITY;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Public client registered for command-line sign-in
const DEFAULT_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Verify server certificates of non-emulator accounts
    #[serde(default = "default_strict_ssl")]
    pub strict_ssl: bool,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Client id of a user-assigned platform identity
    #[serde(default)]
    pub identity_client_id: Option<String>,
    /// Prefer the platform identity even when the probe says otherwise
    #[serde(default)]
    pub use_implicit_identity: bool,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_metadata_endpoint")]
    pub metadata_endpoint: String,
    #[serde(default = "default_identity_endpoint")]
    pub identity_endpoint: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_strict_ssl() -> bool {
    true
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

fn default_metadata_endpoint() -> String {
    DEFAULT_METADATA_ENDPOINT.to_string()
}

fn default_identity_endpoint() -> String {
    DEFAULT_IDENTITY_ENDPOINT.to_string()
}

fn default_probe_timeout_secs() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strict_ssl: default_strict_ssl(),
            proxy: None,
            tenant_id: None,
            identity_client_id: None,
            use_implicit_identity: false,
            client_id: default_client_id(),
            authority: default_authority(),
            metadata_endpoint: default_metadata_endpoint(),
            identity_endpoint: default_identity_endpoint(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Settings {
    pub fn credential_options(&self) -> CredentialOptions {
        CredentialOptions {
            tenant_id: self.tenant_id.clone(),
            identity_client_id: self.identity_client_id.clone(),
            force_implicit: self.use_implicit_identity,
        }
    }

    pub fn platform_probe(&self) -> PlatformProbe {
        PlatformProbe::new(
            self.metadata_endpoint.clone(),
            Duration::from_secs(self.probe_timeout_secs),
        )
    }

    /// Update a setting by name from its string form
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let optional = |v: &str| {
            let v = v.trim();
            if v.is_empty() || v == "none" { None } else { Some(v.to_string()) }
        };

        match name {
            "strict_ssl" => self.strict_ssl = parse_bool(value)?,
            "proxy" => self.proxy = optional(value),
            "tenant_id" => self.tenant_id = optional(value),
            "identity_client_id" => self.identity_client_id = optional(value),
            "use_implicit_identity" => self.use_implicit_identity = parse_bool(value)?,
            "client_id" => self.client_id = value.trim().to_string(),
            "authority" => self.authority = value.trim().to_string(),
            "metadata_endpoint" => self.metadata_endpoint = value.trim().to_string(),
            "identity_endpoint" => self.identity_endpoint = value.trim().to_string(),
            "probe_timeout_secs" => {
                self.probe_timeout_secs = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid timeout: {}", value))?
            }
            _ => anyhow::bail!("Unknown setting '{}'", name),
        }
        Ok(())
    }

    /// Apply `DOCDB_*` environment overrides (a `.env` file is honored)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("DOCDB_STRICT_SSL") {
            match parse_bool(&value) {
                Ok(strict) => self.strict_ssl = strict,
                Err(_) => warn!("Ignoring invalid DOCDB_STRICT_SSL value: {}", value),
            }
        }
        if let Ok(proxy) = std::env::var("DOCDB_PROXY") {
            self.proxy = Some(proxy);
        }
        if let Ok(tenant) = std::env::var("DOCDB_TENANT_ID") {
            self.tenant_id = Some(tenant);
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("Expected a boolean, got '{}'", value),
    }
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // Use XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("docdb-auth")
        } else {
            // Use home directory with dot prefix on Windows/Mac
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".docdb-auth")
        };

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        debug!("Saving config to: {:?}", config_path);

        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)
                    .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
                info!("Created config directory: {:?}", config_dir);
            }
        }

        let config_content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Config saved successfully");
        Ok(())
    }
}
