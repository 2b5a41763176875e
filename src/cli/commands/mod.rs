pub mod cluster;
pub mod config;
pub mod probe;
pub mod token;

pub use cluster::{ClusterCommands, handle_cluster_command};
pub use config::{ConfigCommands, handle_config_command};
pub use probe::{ProbeArgs, handle_probe_command};
pub use token::{TokenArgs, handle_token_command};
