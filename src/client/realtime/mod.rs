//! Realtime notification stream
//!
//! - **`backoff`** - Reconnect delay schedule
//! - **`sink`** - Where unseen counts and connection status are written
//! - **`transport`** - Ticket-authenticated SSE connection
//! - **`manager`** - Connection state machine tying the above together

pub mod backoff;
pub mod manager;
pub mod sink;
pub mod transport;

pub use backoff::Backoff;
pub use manager::{NotificationStreamManager, StreamOptions, StreamSnapshot, StreamState, WeakStreamManager};
pub use sink::{NotificationSink, NotificationState, NotificationStore};
pub use transport::{SseTransport, Transport, TransportCloser, TransportEvents, TransportHandle};
