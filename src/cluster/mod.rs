//! Cluster-style connections authenticated by username and password

pub mod cache;
pub mod connection_string;
pub mod session;

pub use cache::{CachedSecret, CredentialCache, EmulatorConfiguration, cluster_credentials};
pub use connection_string::ClusterConnectionString;
pub use session::ClusterAuthenticator;
