use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use docdb_auth::cluster::{ClusterAuthenticator, ClusterConnectionString, EmulatorConfiguration, cluster_credentials};
use docdb_auth::ui::TerminalPrompt;
use docdb_auth::ui::prompts::prompt_retry_confirmation;

const DEFAULT_PORT: u16 = 27017;

#[derive(Args)]
pub struct ClusterCommands {
    #[command(subcommand)]
    pub command: ClusterSubcommands,
}

#[derive(Subcommand)]
pub enum ClusterSubcommands {
    /// Authenticate to a cluster and check that it is reachable
    Connect {
        /// Identifier the credentials are cached under
        #[arg(long)]
        id: String,
        /// Cluster connection string (mongodb:// or mongodb+srv://)
        #[arg(long)]
        connection_string: String,
        /// The cluster is a local emulator
        #[arg(long)]
        emulator: bool,
        /// Skip emulator certificate checks
        #[arg(long, requires = "emulator")]
        disable_emulator_security: bool,
    },
}

pub async fn handle_cluster_command(args: ClusterCommands) -> Result<()> {
    match args.command {
        ClusterSubcommands::Connect {
            id,
            connection_string,
            emulator,
            disable_emulator_security,
        } => {
            let emulator_config = emulator.then_some(EmulatorConfiguration {
                is_emulator: true,
                disable_emulator_security,
            });
            connect(&id, &connection_string, emulator_config).await
        }
    }
}

async fn connect(id: &str, connection_string: &str, emulator_config: Option<EmulatorConfiguration>) -> Result<()> {
    let authenticator = ClusterAuthenticator::new(cluster_credentials(), Arc::new(TerminalPrompt::new()));

    loop {
        let result = authenticator
            .connect(id, connection_string, emulator_config, |authenticated| async move {
                let parsed = ClusterConnectionString::parse(&authenticated)?;
                check_reachable(&parsed).await?;
                Ok::<_, anyhow::Error>(parsed)
            })
            .await;

        match result {
            Ok(parsed) => {
                println!("  {} Connected: {}", "✓".bright_green(), parsed.masked());
                return Ok(());
            }
            Err(e) => {
                println!("  {} {:#}", "✗".bright_red(), e);
                if !prompt_retry_confirmation(id)? {
                    return Err(e);
                }
            }
        }
    }
}

/// Plain TCP reachability of the first host; SRV records are not resolved here
async fn check_reachable(connection_string: &ClusterConnectionString) -> Result<()> {
    if connection_string.is_srv() {
        return Ok(());
    }

    let first_host = connection_string
        .hosts()
        .split(',')
        .next()
        .context("Connection string has no hosts")?;
    let address = if first_host.contains(':') {
        first_host.to_string()
    } else {
        format!("{}:{}", first_host, DEFAULT_PORT)
    };

    tokio::time::timeout(Duration::from_secs(10), TcpStream::connect(&address))
        .await
        .with_context(|| format!("Timed out connecting to {}", address))?
        .with_context(|| format!("Failed to connect to {}", address))?;
    Ok(())
}
