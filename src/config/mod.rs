//! Application configuration loading and validation.
//!
//! Settings come from a TOML file. The access token is never read from the
//! file: it is taken from `PARLEY_ACCESS_TOKEN` (optionally with an RFC 3339
//! expiry in `PARLEY_TOKEN_EXPIRES_AT`), which `.env` may provide.
//!
//! ```toml
//! [network]
//! ws_url = "wss://venue.example/ws"
//! api_url = "https://venue.example/api"
//!
//! [reconnection]
//! interval_ms = 5000
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

pub mod logging;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

pub use logging::{LogFormat, LoggingConfig};

use crate::adapter::ApiClient;
use crate::application::SessionConfig;
use crate::error::{ConfigError, Result};
use crate::port::TokenProvider;

pub const ACCESS_TOKEN_VAR: &str = "PARLEY_ACCESS_TOKEN";
pub const TOKEN_EXPIRY_VAR: &str = "PARLEY_TOKEN_EXPIRES_AT";

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// REST request timeout (milliseconds).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_ws_url() -> String {
    "ws://localhost:8000/ws".into()
}

fn default_api_url() -> String {
    "http://localhost:8000/api".into()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_url: default_api_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Fixed-interval reconnection. There is no backoff and no attempt cap.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectionConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// A handshake still pending after this long counts as a failed attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// Forget a prompt's key once the venue reports it resolved, so the same
    /// key can prompt again.
    #[serde(default = "default_true")]
    pub evict_on_terminal: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            evict_on_terminal: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_window_secs() -> u64 {
    60
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    256
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub reconnection: ReconnectionConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse and validate configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<()> {
        if self.network.ws_url.is_empty() {
            return Err(ConfigError::MissingField { field: "ws_url" }.into());
        }
        if self.network.api_url.is_empty() {
            return Err(ConfigError::MissingField { field: "api_url" }.into());
        }

        let ws = Url::parse(&self.network.ws_url).map_err(|e| ConfigError::InvalidValue {
            field: "ws_url",
            reason: e.to_string(),
        })?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue {
                field: "ws_url",
                reason: format!("scheme must be ws or wss, got {}", ws.scheme()),
            }
            .into());
        }
        Url::parse(&self.network.api_url).map_err(|e| ConfigError::InvalidValue {
            field: "api_url",
            reason: e.to_string(),
        })?;

        if self.network.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.reconnection.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "interval_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.reconnection.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connect_timeout_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "capacity",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    #[must_use]
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            reconnect_interval: Duration::from_millis(self.reconnection.interval_ms),
            connect_timeout: Duration::from_millis(self.reconnection.connect_timeout_ms),
            evict_on_terminal: self.dedup.evict_on_terminal,
            confirmation_window: Duration::from_secs(self.confirmation.window_secs),
            bus_capacity: self.bus.capacity,
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.network.request_timeout_ms)
    }

    /// REST client for `network.api_url`, sharing the session's credential.
    #[must_use]
    pub fn api_client(&self, tokens: Arc<dyn TokenProvider>) -> ApiClient {
        ApiClient::new(self.network.api_url.clone(), self.request_timeout(), tokens)
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }
}
