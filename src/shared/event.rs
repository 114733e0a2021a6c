/**
 * Realtime Event Types
 *
 * `TransportEvent` is the uniform shape every transport reports in, so the
 * stream state machine consumes one enum instead of a set of callbacks.
 * `NotificationEvent` is what a named server event means to this client.
 */
use crate::shared::error::PayloadError;
use serde::Deserialize;

/// Something the transport observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The server accepted the connection
    Open,
    /// A named server-sent event with its raw payload
    Message { name: String, data: String },
    /// Network or protocol failure; the transport is done
    Error(String),
    /// The server ended the stream
    Closed,
}

impl TransportEvent {
    pub fn message(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Message {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Whether this event ends the transport
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Closed)
    }
}

/// A named event interpreted for the notification sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Current number of unseen notifications
    UnseenCount(u64),
    /// Any event this client does not know; ignored
    Unknown(String),
}

/// The backend sends a bare number, older builds sent `{ "count": n }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CountPayload {
    Bare(i64),
    Object { count: i64 },
}

impl NotificationEvent {
    /// Interpret a named event.
    ///
    /// Only `unseen_count_event` is parsed; every other name is `Unknown`.
    pub fn parse(
        unseen_count_event: &str,
        name: &str,
        data: &str,
    ) -> Result<Self, PayloadError> {
        if name != unseen_count_event {
            return Ok(Self::Unknown(name.to_string()));
        }
        let count = match serde_json::from_str::<CountPayload>(data.trim())? {
            CountPayload::Bare(n) | CountPayload::Object { count: n } => n,
        };
        u64::try_from(count)
            .map(Self::UnseenCount)
            .map_err(|_| PayloadError::Negative(count))
    }
}
