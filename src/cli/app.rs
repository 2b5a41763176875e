use super::commands::{ClusterCommands, ConfigCommands, ProbeArgs, TokenArgs};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "docdb-auth")]
#[command(about = "Resolve credentials for document database accounts and clusters")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether this process runs on the cloud platform
    Probe(ProbeArgs),
    /// Resolve credentials for an account endpoint and acquire a token
    Token(TokenArgs),
    /// Cluster connections authenticated by username and password
    Cluster(ClusterCommands),
    /// Settings management
    Config(ConfigCommands),
}
