use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use log::debug;
use std::sync::Arc;

use docdb_auth::api::{AuthMode, Authorization, ClientBuilder, TransportOptions};
use docdb_auth::auth::{
    AccountConnectionString, ImdsTokenSource, PasswordGrantSessionProvider, collect_credentials, now_epoch_ms,
    platform_probe,
};
use docdb_auth::config::Config;
use docdb_auth::ui::TerminalPrompt;

#[derive(Args)]
pub struct TokenArgs {
    /// Account endpoint (e.g., https://acct.example.com:443/)
    #[arg(long, conflicts_with = "connection_string")]
    pub endpoint: Option<String>,
    /// Account connection string (AccountEndpoint=...;AccountKey=...)
    #[arg(long)]
    pub connection_string: Option<String>,
    /// Account key; falls back to DOCDB_ACCOUNT_KEY
    #[arg(long)]
    pub key: Option<String>,
    /// Tenant to sign in to
    #[arg(long)]
    pub tenant: Option<String>,
    /// Client id of a user-assigned platform identity
    #[arg(long)]
    pub identity_client_id: Option<String>,
    /// Use the platform identity even if the probe says otherwise
    #[arg(long)]
    pub implicit: bool,
    /// The endpoint is a local emulator
    #[arg(long)]
    pub emulator: bool,
    /// Scope to request; defaults to the account-wide scope
    #[arg(long)]
    pub scope: Vec<String>,
    /// Proxy for requests to the account
    #[arg(long)]
    pub proxy: Option<String>,
}

pub async fn handle_token_command(args: TokenArgs, config: &Config) -> Result<()> {
    let settings = &config.settings;

    let (endpoint, key) = match &args.connection_string {
        Some(connection_string) => {
            let parsed = AccountConnectionString::parse(connection_string)?;
            (parsed.endpoint.clone(), Some(parsed.key.clone()))
        }
        None => {
            let endpoint = args
                .endpoint
                .clone()
                .context("Provide --endpoint or --connection-string")?;
            let key = args.key.clone().or_else(|| std::env::var("DOCDB_ACCOUNT_KEY").ok());
            (endpoint, key)
        }
    };

    let mut options = settings.credential_options();
    if args.tenant.is_some() {
        options.tenant_id = args.tenant.clone();
    }
    if args.identity_client_id.is_some() {
        options.identity_client_id = args.identity_client_id.clone();
    }
    options.force_implicit |= args.implicit;

    let implicit_source = Arc::new(ImdsTokenSource::with_endpoint(settings.identity_endpoint.clone()));
    let credentials = collect_credentials(
        &endpoint,
        key,
        &options,
        platform_probe().as_ref(),
        implicit_source.as_ref(),
    )
    .await;
    debug!("Credentials for {}: {:?}", endpoint, credentials);

    let interactive = Arc::new(PasswordGrantSessionProvider::with_authority(
        settings.authority.clone(),
        settings.client_id.clone(),
        Arc::new(TerminalPrompt::new()),
    ));

    let transport = TransportOptions {
        proxy: args.proxy.clone(),
        ..Default::default()
    };

    let client = ClientBuilder::new(interactive, implicit_source)
        .strict_ssl(settings.strict_ssl)
        .proxy(settings.proxy.clone())
        .build(&endpoint, &credentials, args.emulator, transport)?;

    println!("🔐 {} {}", "Account:".dimmed(), client.endpoint().as_str().bright_white());
    let kinds: Vec<String> = credentials.iter().map(|c| c.kind().to_string()).collect();
    println!("  {} {}", "Credentials:".dimmed(), kinds.join(", "));

    if client.auth_mode() == AuthMode::Key {
        println!("  {} Account key configured, no token required", "✓".bright_green());
        return Ok(());
    }

    let scopes = if args.scope.is_empty() {
        client.default_scopes()?
    } else {
        args.scope.clone()
    };

    match client.authorization(&scopes).await? {
        Authorization::Bearer(token) => {
            println!("  {} Token acquired: {}", "✓".bright_green(), mask(&token.token));
            match token.expires_at() {
                Some(expires_at) if !token.needs_revalidation(now_epoch_ms()) => {
                    println!("  {} {}", "Expires:".dimmed(), expires_at.to_rfc3339())
                }
                Some(expires_at) => println!("  {} {}", "Expired:".bright_yellow(), expires_at.to_rfc3339()),
                None => println!("  {} unknown, revalidate before reuse", "Expires:".dimmed()),
            }
        }
        Authorization::Key(_) => println!("  {} Account key configured", "✓".bright_green()),
    }

    Ok(())
}

fn mask(token: &str) -> String {
    let visible: String = token.chars().take(8).collect();
    format!("{}… ({} chars)", visible, token.chars().count())
}
