//! Application configuration module
//!
//! Settings for the notification channel: where the API lives, which paths
//! issue tickets and renew tokens, and how aggressively to reconnect.
//!
//! Sources are layered lowest to highest: built-in defaults, an optional TOML
//! file, then environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server URL, without a trailing slash
    pub server_url: String,
    /// Token renewal endpoint
    pub renew_path: String,
    /// One-time stream ticket endpoint
    pub ticket_path: String,
    /// Notification event stream endpoint
    pub stream_path: String,
    /// Total timeout for REST calls
    pub request_timeout_ms: u64,
    /// Connect timeout, also applied to the event stream
    pub connect_timeout_ms: u64,
    /// First reconnect delay
    pub backoff_base_ms: u64,
    /// Upper bound for reconnect delays
    pub backoff_cap_ms: u64,
    /// Name of the server-sent event carrying the unseen count
    pub unseen_count_event: String,
    /// Cookie that carries the refresh credential
    pub refresh_cookie: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            renew_path: "/api/auth/renew-token".to_string(),
            ticket_path: "/api/auth/sse-ticket".to_string(),
            stream_path: "/api/notifications/stream".to_string(),
            request_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            unseen_count_event: "unseen-count".to_string(),
            refresh_cookie: "refreshToken".to_string(),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.server_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                self.server_url
            )));
        }

        for (name, path) in [
            ("renew_path", &self.renew_path),
            ("ticket_path", &self.ticket_path),
            ("stream_path", &self.stream_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(name, "must start with '/'"));
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("request_timeout_ms", "must be non-zero"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid("connect_timeout_ms", "must be non-zero"));
        }
        if self.backoff_base_ms == 0 {
            return Err(ConfigError::invalid("backoff_base_ms", "must be non-zero"));
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(ConfigError::invalid(
                "backoff_cap_ms",
                "must not be smaller than backoff_base_ms",
            ));
        }
        if self.unseen_count_event.trim().is_empty() {
            return Err(ConfigError::invalid("unseen_count_event", "must not be empty"));
        }
        if self.refresh_cookie.trim().is_empty() {
            return Err(ConfigError::invalid("refresh_cookie", "must not be empty"));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file; a missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    /// Default config file location (`<config dir>/feedlink/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("feedlink").join("config.toml"))
    }

    /// Overlay environment variables on top of this configuration
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(url) = std::env::var("CLIENT_API_URL") {
            self.server_url = url;
        }
        if let Ok(path) = std::env::var("FEEDLINK_RENEW_PATH") {
            self.renew_path = path;
        }
        if let Ok(path) = std::env::var("FEEDLINK_TICKET_PATH") {
            self.ticket_path = path;
        }
        if let Ok(path) = std::env::var("FEEDLINK_STREAM_PATH") {
            self.stream_path = path;
        }
        if let Some(ms) = env_millis("FEEDLINK_REQUEST_TIMEOUT_MS")? {
            self.request_timeout_ms = ms;
        }
        if let Some(ms) = env_millis("FEEDLINK_BACKOFF_BASE_MS")? {
            self.backoff_base_ms = ms;
        }
        if let Some(ms) = env_millis("FEEDLINK_BACKOFF_CAP_MS")? {
            self.backoff_cap_ms = ms;
        }
        self.validate()?;
        Ok(self)
    }

    /// Defaults, then the default config file, then the environment
    pub fn load() -> Result<Self, ConfigError> {
        let base = match Self::default_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        base.with_env_overrides()
    }

    /// Server URL with any trailing slash removed
    pub fn server_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}

fn env_millis(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, format!("not a number of milliseconds: {raw}"))),
        Err(_) => Ok(None),
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn renew_path(mut self, path: impl Into<String>) -> Self {
        self.config.renew_path = path.into();
        self
    }

    pub fn ticket_path(mut self, path: impl Into<String>) -> Self {
        self.config.ticket_path = path.into();
        self
    }

    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.config.stream_path = path.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the reconnect backoff base and cap
    pub fn backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.config.backoff_base_ms = base.as_millis() as u64;
        self.config.backoff_cap_ms = cap.as_millis() as u64;
        self
    }

    pub fn unseen_count_event(mut self, name: impl Into<String>) -> Self {
        self.config.unseen_count_event = name.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("config file error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
