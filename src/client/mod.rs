//! Client Module
//!
//! Runtime side of the notification channel: everything that talks to the
//! server or holds mutable session state.
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs            - Module exports and documentation
//! ├── config.rs         - Validated configuration and endpoint URLs
//! ├── session.rs        - Injected session store
//! ├── auth/             - Token renewal and single-flight refresh
//! ├── api.rs            - Authorized REST client (refresh and retry once)
//! ├── ticket.rs         - One-time stream ticket exchange
//! ├── realtime/         - Stream state machine, SSE transport, sink
//! ├── activation.rs     - When the stream should run
//! └── notifications.rs  - Everything wired together
//! ```

pub mod activation;
pub mod api;
pub mod auth;
pub mod config;
pub mod notifications;
pub mod realtime;
pub mod session;
pub mod ticket;

pub use activation::{
    ActivationDecision, ActivationDriver, ActivationInputs, ProfileFlags, Role, StreamActivationPolicy,
};
pub use api::{build_http_client, AuthorizedClient};
pub use auth::{HttpTokenRenewer, RefreshCoordinator, RefreshOutcome, RenewedTokens, SessionTeardown, TokenRenewer};
pub use config::Config;
pub use notifications::NotificationClient;
pub use realtime::{
    Backoff, NotificationSink, NotificationState, NotificationStore, NotificationStreamManager, SseTransport,
    StreamOptions, StreamSnapshot, StreamState, Transport, TransportHandle,
};
pub use session::{MemorySession, SessionStore};
pub use ticket::{HttpTicketClient, TicketExchange};
