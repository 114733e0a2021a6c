//! Stream manager wired to fakes
//!
//! Tests run on a paused clock. `settle` lets every spawned task run until it
//! blocks; `advance` moves the clock and then settles.

use super::fakes::{FakeTickets, FakeTransport, RecordingSink};
use feedlink::client::realtime::{NotificationStreamManager, StreamOptions, StreamState};
use feedlink::client::session::MemorySession;
use feedlink::shared::token::{AccessToken, RefreshCredential};
use std::sync::Arc;
use std::time::Duration;

pub struct StreamHarness {
    pub session: Arc<MemorySession>,
    pub tickets: Arc<FakeTickets>,
    pub transport: Arc<FakeTransport>,
    pub sink: Arc<RecordingSink>,
    pub manager: NotificationStreamManager,
}

impl StreamHarness {
    pub fn new() -> Self {
        let session = Arc::new(MemorySession::new(
            AccessToken::new("access-1"),
            RefreshCredential::new("refresh-1"),
        ));
        Self::with_session(session)
    }

    pub fn with_session(session: Arc<MemorySession>) -> Self {
        let tickets = Arc::new(FakeTickets::new());
        let transport = Arc::new(FakeTransport::new());
        let sink = Arc::new(RecordingSink::new());
        let manager = NotificationStreamManager::new(
            session.clone(),
            tickets.clone(),
            transport.clone(),
            sink.clone(),
            StreamOptions::default(),
        );
        Self {
            session,
            tickets,
            transport,
            sink,
            manager,
        }
    }

    pub async fn state(&self) -> StreamState {
        self.manager.state().await
    }

    pub async fn retry_count(&self) -> u32 {
        self.manager.snapshot().await.retry_count
    }
}

/// Let spawned tasks run until they block
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Move the paused clock forward, then settle
pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}
