use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::*;

use docdb_auth::config::Config;

#[derive(Args)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Show current settings
    Show,
    /// Print the config file location
    Path,
    /// Set the value of a specific setting
    Set {
        /// Setting name
        name: String,
        /// Setting value
        value: String,
    },
}

pub fn handle_config_command(args: ConfigCommands, config: &Config) -> Result<()> {
    match args.command {
        ConfigSubcommands::Show => {
            let rendered = toml::to_string_pretty(config).context("Failed to render settings")?;
            println!("{}", rendered);
        }
        ConfigSubcommands::Path => {
            println!("{}", Config::get_config_path()?.display());
        }
        ConfigSubcommands::Set { name, value } => {
            // Persist the file as stored, without environment overrides
            let mut stored = Config::load()?;
            stored.settings.set(&name, &value)?;
            stored.save()?;
            println!("  {} {} = {}", "✓".bright_green(), name.bright_white(), value);
        }
    }
    Ok(())
}
