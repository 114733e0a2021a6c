use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use url::Url;

/// Client configuration wrapper.
///
/// Validates once at construction so the URL helpers cannot fail later.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    server: Url,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_app(AppConfig::default())
    }

    pub fn from_app(app: AppConfig) -> Result<Self, ConfigError> {
        app.validate()?;
        let server = Url::parse(app.server_url())
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", app.server_url, e)))?;
        Ok(Self { app, server })
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Self::from_app(builder.build()?)
    }

    /// Defaults, config file and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_app(AppConfig::load()?)
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url()
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    pub fn renew_url(&self) -> String {
        self.api_url(&self.app.renew_path)
    }

    pub fn ticket_url(&self) -> String {
        self.api_url(&self.app.ticket_path)
    }

    /// Stream endpoint with the ticket as its only query parameter.
    ///
    /// The ticket is percent-encoded; event streams cannot carry an
    /// `Authorization` header, so the URI is the only place for it.
    pub fn stream_url(&self, ticket: &str) -> Url {
        let mut url = self.server.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}{}", base_path, self.app.stream_path));
        url.query_pairs_mut().clear().append_pair("ticket", ticket);
        url
    }
}
