//! Feedlink - Realtime Notification Channel
//!
//! Client side of a ticket-authenticated server-sent event stream that keeps
//! an unseen-notification count current, plus the token refresh machinery
//! the stream and every other authenticated call depend on.
//!
//! # Overview
//!
//! - Single-flight access token refresh shared by every REST call
//! - One-time stream tickets, fetched fresh for each connection attempt
//! - A reconnecting stream state machine with capped exponential backoff
//! - An activation policy that starts and stops the stream as the session
//!   and profile change
//!
//! # Module Structure
//!
//! - **`shared`** - Platform-agnostic types
//!   - Error enums, configuration
//!   - Tokens, refresh credentials and tickets
//!   - Transport and notification events
//!
//! - **`client`** - Runtime pieces
//!   - Session store, refresh coordinator, authorized HTTP client
//!   - Ticket exchange, SSE transport, stream manager
//!   - Activation policy and the `NotificationClient` façade
//!
//! # Usage
//!
//! ```rust,no_run
//! use feedlink::client::{Config, MemorySession, NotificationClient, ProfileFlags, Role};
//! use feedlink::shared::token::AccessToken;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! # async fn example() -> Result<(), feedlink::shared::SetupError> {
//! let session = Arc::new(MemorySession::new(AccessToken::new("token"), None));
//! let client = NotificationClient::new(Config::load()?, session).await?;
//!
//! let profile = ProfileFlags { onboarding_complete: true, role: Role::User };
//! let (_profile_tx, profile_rx) = watch::channel(profile);
//! client.spawn_activation(profile_rx);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! - The session is a `watch` channel; readers always see the latest token
//! - The refresh coordinator and the stream manager each serialize their
//!   state behind one `tokio::sync::Mutex`
//! - Stale work from a stopped stream run is detected by generation and dropped

/// Shared types and data structures
pub mod shared;

/// Session, refresh, ticket and stream runtime
pub mod client;
