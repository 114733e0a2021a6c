//! Shared Error Types
//!
//! Every seam of the notification channel has its own error enum so callers
//! can match on exactly the failures that seam produces.
//!
//! # Error Categories
//!
//! - `RefreshError` - access token renewal failures (shared by all single-flight waiters)
//! - `TicketError` - one-time stream ticket exchange failures
//! - `ApiError` - authenticated REST call failures after the refresh-and-retry policy
//! - `PayloadError` - a named stream event whose payload could not be parsed
//! - `SetupError` - the client could not be assembled
//!
//! # Usage
//!
//! ```rust
//! use feedlink::shared::error::TicketError;
//!
//! let error = TicketError::server(503, "ticket store unavailable");
//! assert!(!error.is_terminal());
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync + Clone` so one outcome can be handed to
//! every task waiting on it.
use crate::shared::config::ConfigError;
use thiserror::Error;

/// Access token renewal failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh credential is held, so renewal cannot be attempted
    #[error("no refresh credential available")]
    MissingCredential,

    /// The server refused to renew the session
    #[error("token renewal rejected ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the renew endpoint
        status: u16,
        /// Human-readable reason
        message: String,
    },

    /// The renew request never produced a response
    #[error("network error during token renewal: {0}")]
    Network(String),

    /// The renew endpoint answered, but without a usable access token
    #[error("malformed renewal response: {0}")]
    MalformedResponse(String),
}

impl RefreshError {
    /// Create a rejection error
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// One-time stream ticket exchange failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// No access token was available to authenticate the exchange
    #[error("no access token available for ticket exchange")]
    MissingCredential,

    /// The server rejected the access token
    #[error("ticket exchange unauthorized")]
    Unauthorized,

    /// The server issued something that cannot be a ticket
    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    /// The ticket request never produced a response
    #[error("network error during ticket exchange: {0}")]
    Network(String),

    /// Non-success status other than an authorization failure
    #[error("ticket exchange failed ({status}): {message}")]
    Server {
        /// HTTP status
        status: u16,
        /// Human-readable reason
        message: String,
    },

    /// The response body was not a ticket envelope
    #[error("malformed ticket response: {0}")]
    MalformedResponse(String),
}

impl TicketError {
    /// Create a server error
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Whether a stream run must stop instead of retrying with backoff.
    ///
    /// Credential problems do not go away by waiting; only a new token does.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MissingCredential | Self::Unauthorized)
    }
}

/// Authenticated REST call failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No access token held by the session
    #[error("not authenticated")]
    MissingCredential,

    /// Still unauthorized after one refresh-and-retry
    #[error("unauthorized after token refresh")]
    Unauthorized,

    /// The refresh triggered by the first authorization failure failed
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-success status
    #[error("request failed ({status}): {message}")]
    Status {
        /// HTTP status
        status: u16,
        /// Response body or status text
        message: String,
    },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<ApiError> for TicketError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::MissingCredential => Self::MissingCredential,
            // A failed refresh means the session is gone; nothing to retry.
            ApiError::Unauthorized | ApiError::Refresh(_) => Self::Unauthorized,
            ApiError::Network(message) => Self::Network(message),
            ApiError::Status { status, message } => Self::Server { status, message },
        }
    }
}

/// A named stream event whose payload failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Not JSON, or JSON of the wrong shape
    #[error("invalid payload: {0}")]
    Json(String),

    /// A count cannot be negative
    #[error("negative count: {0}")]
    Negative(i64),
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Failures while assembling a client from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Http(String),
}

impl From<reqwest::Error> for SetupError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
