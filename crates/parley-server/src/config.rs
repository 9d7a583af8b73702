//! Server configuration.

use std::time::Duration;

use parley_settings::BridgeSettings;

/// Runtime configuration of the HTTP surface.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Bearer token every `/message` call must present.
    pub api_key: String,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// How long in-flight requests may drain after shutdown starts.
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// Project the HTTP-relevant part of the settings. A missing API key
    /// becomes an empty string, which no request can match.
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            api_key: settings.auth.api_key.clone().unwrap_or_default(),
            max_body_bytes: settings.server.max_body_bytes,
            shutdown_grace: settings.server.shutdown_grace(),
        }
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            api_key: String::new(),
            max_body_bytes: 64 * 1024,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}
