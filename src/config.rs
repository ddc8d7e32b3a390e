//! Client configuration.
//!
//! Read once at client construction; there is no hot-reload. How the values
//! get here (file, environment, CLI) is the embedding application's
//! concern.

use serde::{Deserialize, Serialize};

/// Connection target and credentials for a manager session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server hostname or address.
    pub server: String,
    /// Manager port.
    pub port: u16,
    /// Manager username, sent in the login action.
    pub username: String,
    /// Manager secret - NOT serialized to disk; provisioned by the
    /// embedding application.
    #[serde(skip)]
    pub secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 5038,
            username: String::new(),
            secret: String::new(),
        }
    }
}

impl Config {
    /// Create a config for the given target and credentials.
    pub fn new(
        server: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            username: username.into(),
            secret: secret.into(),
        }
    }
}
