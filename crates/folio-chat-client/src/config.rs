//! Client configuration.
//!
//! Every field has a default suitable for local development, so an empty
//! document or environment yields a working configuration.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::target::ChatTarget;

/// Environment variable overriding [`ClientConfig::api_url`].
pub const ENV_API_URL: &str = "FOLIO_API_URL";
/// Environment variable overriding [`ClientConfig::ws_url`].
pub const ENV_WS_URL: &str = "FOLIO_WS_URL";
/// Environment variable overriding [`ClientConfig::reconnect_on_close`].
pub const ENV_RECONNECT_ON_CLOSE: &str = "FOLIO_RECONNECT_ON_CLOSE";

/// Errors produced while building or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A URL setting could not be parsed.
    #[error("invalid URL for {field}: {value:?} ({source})")]
    InvalidUrl {
        /// Setting name.
        field: &'static str,
        /// Offending value.
        value: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// A URL setting has a scheme the client cannot use.
    #[error("unsupported scheme for {field}: {scheme}")]
    UnsupportedScheme {
        /// Setting name.
        field: &'static str,
        /// Offending scheme.
        scheme: String,
    },

    /// An environment variable has an unusable value.
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// A timing or budget setting is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Configuration for the chat client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base HTTP API URL (e.g., `http://localhost:8000`).
    #[serde(default = "ClientConfig::default_api_url")]
    pub api_url: String,

    /// Base streaming-connection URL (e.g., `ws://localhost:8000`).
    #[serde(default = "ClientConfig::default_ws_url")]
    pub ws_url: String,

    /// Path of the chat endpoint, appended to `ws_url`.
    #[serde(default = "ClientConfig::default_chat_path")]
    pub chat_path: String,

    /// Delay before reconnecting after a dropped connection, in milliseconds.
    #[serde(default = "ClientConfig::default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Typewriter tick period, in milliseconds.
    #[serde(default = "ClientConfig::default_drain_interval")]
    pub drain_interval_ms: u64,

    /// Characters revealed per typewriter tick.
    #[serde(default = "ClientConfig::default_chars_per_tick")]
    pub chars_per_tick: usize,

    /// Poll period while a finished reply waits for its text to drain, in milliseconds.
    #[serde(default = "ClientConfig::default_done_poll_interval")]
    pub done_poll_interval_ms: u64,

    /// Reconnect after closes the client did not ask for.
    #[serde(default = "ClientConfig::default_reconnect_on_close")]
    pub reconnect_on_close: bool,
}

impl ClientConfig {
    fn default_api_url() -> String {
        "http://localhost:8000".to_string()
    }

    fn default_ws_url() -> String {
        "ws://localhost:8000".to_string()
    }

    fn default_chat_path() -> String {
        "/api/v1/chat".to_string()
    }

    const fn default_reconnect_delay() -> u64 {
        3000
    }

    const fn default_drain_interval() -> u64 {
        20
    }

    const fn default_chars_per_tick() -> usize {
        2
    }

    const fn default_done_poll_interval() -> u64 {
        50
    }

    const fn default_reconnect_on_close() -> bool {
        true
    }

    /// Build a configuration from defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a configuration from defaults overlaid with values from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_API_URL) {
            config.api_url = value;
        }
        if let Some(value) = lookup(ENV_WS_URL) {
            config.ws_url = value;
        }
        if let Some(value) = lookup(ENV_RECONNECT_ON_CLOSE) {
            config.reconnect_on_close = parse_bool(&value).ok_or(ConfigError::InvalidEnv {
                var: ENV_RECONNECT_ON_CLOSE,
                value,
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that URLs parse and that timings are usable.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme("api_url", &self.api_url, &["http", "https"])?;
        check_scheme("ws_url", &self.ws_url, &["ws", "wss"])?;

        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::Zero("reconnect_delay_ms"));
        }
        if self.drain_interval_ms == 0 {
            return Err(ConfigError::Zero("drain_interval_ms"));
        }
        if self.chars_per_tick == 0 {
            return Err(ConfigError::Zero("chars_per_tick"));
        }
        if self.done_poll_interval_ms == 0 {
            return Err(ConfigError::Zero("done_poll_interval_ms"));
        }
        Ok(())
    }

    /// Connection URL for a chat target.
    ///
    /// Object targets carry `object_id` and `object_title` query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `ws_url` and `chat_path` do not form a valid URL.
    pub fn chat_url(&self, target: &ChatTarget) -> Result<Url, ConfigError> {
        let raw = format!(
            "{}/{}",
            self.ws_url.trim_end_matches('/'),
            self.chat_path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
            field: "ws_url",
            value: raw.clone(),
            source,
        })?;

        if let ChatTarget::Object { id, title } = target {
            url.query_pairs_mut()
                .append_pair("object_id", id.as_str())
                .append_pair("object_title", title);
        }
        Ok(url)
    }

    /// Get the reconnect delay as a `Duration`.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Get the typewriter tick period as a `Duration`.
    #[must_use]
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    /// Get the done-gating poll period as a `Duration`.
    #[must_use]
    pub fn done_poll_interval(&self) -> Duration {
        Duration::from_millis(self.done_poll_interval_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Self::default_api_url(),
            ws_url: Self::default_ws_url(),
            chat_path: Self::default_chat_path(),
            reconnect_delay_ms: Self::default_reconnect_delay(),
            drain_interval_ms: Self::default_drain_interval(),
            chars_per_tick: Self::default_chars_per_tick(),
            done_poll_interval_ms: Self::default_done_poll_interval(),
            reconnect_on_close: Self::default_reconnect_on_close(),
        }
    }
}

fn check_scheme(field: &'static str, value: &str, allowed: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        source,
    })?;
    if allowed.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedScheme {
            field,
            scheme: url.scheme().to_string(),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
