use anyhow::Result;
use clap::Parser;
use log::{debug, info};

use docdb_auth::auth::PlatformProbe;
use docdb_auth::config::Config;

mod cli;

use cli::Cli;
use cli::app::Commands;
use cli::commands::{handle_cluster_command, handle_config_command, handle_probe_command, handle_token_command};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("docdb-auth.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    dotenvy::dotenv().ok();

    let mut config = Config::load()?;
    config.settings.apply_env_overrides();
    debug!("Effective settings: {:?}", config.settings);

    // The probe must be configured before anything asks it
    PlatformProbe::install(config.settings.platform_probe());

    let cli = Cli::parse();
    info!("Starting docdb-auth");

    match cli.command {
        Commands::Probe(args) => handle_probe_command(args).await,
        Commands::Token(args) => handle_token_command(args, &config).await,
        Commands::Cluster(args) => handle_cluster_command(args).await,
        Commands::Config(args) => handle_config_command(args, &config),
    }
}
