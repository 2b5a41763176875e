//! Database account clients
//!
//! Builds clients whose authentication is either a static account key or a
//! lazily invoked token provider, never both.

pub mod client;
pub mod options;

pub use client::{AuthMode, Authorization, ClientAuth, ClientBuilder, DatabaseClient};
pub use options::{ConnectionPolicy, TransportOptions, TransportOptionsBuilder};
