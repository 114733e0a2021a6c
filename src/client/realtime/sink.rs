//! Notification sink: where the stream manager writes what it learns.
//!
//! The manager only ever writes through the three `NotificationSink` methods
//! and never reads state back, so the host can plug in any state container.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// Write-only view of the host's notification state
pub trait NotificationSink: Send + Sync {
    fn set_count(&self, count: u64);
    fn set_connected(&self, connected: bool);
    fn set_error(&self, error: Option<String>);
}

/// Snapshot of what the UI shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationState {
    pub unseen_count: u64,
    pub connected: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self {
            unseen_count: 0,
            connected: false,
            error: None,
            updated_at: None,
        }
    }
}

/// Watch-backed sink the host can subscribe to
#[derive(Debug)]
pub struct NotificationStore {
    state: watch::Sender<NotificationState>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(NotificationState::default());
        Self { state }
    }

    pub fn snapshot(&self) -> NotificationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    /// Apply `f`, notifying subscribers only if something changed
    fn update(&self, f: impl FnOnce(&mut NotificationState)) {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            let changed = *state != before;
            if changed {
                state.updated_at = Some(Utc::now());
            }
            changed
        });
    }
}

impl NotificationSink for NotificationStore {
    fn set_count(&self, count: u64) {
        self.update(|state| state.unseen_count = count);
    }

    fn set_connected(&self, connected: bool) {
        self.update(|state| state.connected = connected);
    }

    fn set_error(&self, error: Option<String>) {
        self.update(|state| state.error = error);
    }
}
