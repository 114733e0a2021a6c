//! Shared Module
//!
//! Platform-agnostic types used by every part of the client: error enums,
//! configuration, credentials and realtime event shapes. Nothing in here does
//! I/O apart from reading the config file.

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Access tokens, refresh credentials and stream tickets
pub mod token;

/// Transport and notification event types
pub mod event;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::{ApiError, PayloadError, RefreshError, SetupError, TicketError};
pub use event::{NotificationEvent, TransportEvent};
pub use token::{AccessToken, RefreshCredential, Ticket};
