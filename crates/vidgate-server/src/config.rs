//! Server configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8200;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(ServerConfig {
            host: std::env::var("VIDGATE_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            port: std::env::var("VIDGATE_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            shutdown_timeout_secs: std::env::var("VIDGATE_SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        })
    }

    /// Grace period given to in-flight requests after a shutdown signal
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
