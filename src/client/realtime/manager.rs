//! # Notification Stream Manager
//!
//! Owns the lifecycle of the one realtime connection:
//!
//! ```text
//! Idle ─start─▶ FetchingTicket ─ok─▶ Connecting ─open─▶ Open
//!                  │    ▲                 │               │
//!          terminal│    └─timer─ Reconnecting ◀─error─────┘
//!                  ▼                  (backoff)
//!               Failed          stop() from anywhere ─▶ Closed
//! ```
//!
//! Every transition and every sink write happens under the connection lock
//! and is checked against the run's generation. `start()` and `stop()` bump
//! the generation, so a timer, ticket response or transport event that
//! belongs to an earlier run finds itself stale and does nothing, even if
//! aborting its task raced with it.
//!
//! A fresh ticket is requested on every entry into `FetchingTicket`, and the
//! session token is re-read each time, so a refresh that happened in the
//! meantime is picked up by the next reconnect.
//!
//! Each run remembers the token it is bound to: the one its ticket was issued
//! for, or the one its ticket request was refused with. [`rebind`] only
//! restarts for a token the run has not already seen. A ticket request that
//! refreshes underneath therefore never restarts its own run, and a
//! refusal that survived its own refresh stays `Failed` until the session
//! holds a different token.
//!
//! [`rebind`]: NotificationStreamManager::rebind

use crate::client::auth::SessionTeardown;
use crate::client::config::Config;
use crate::client::realtime::backoff::Backoff;
use crate::client::realtime::sink::NotificationSink;
use crate::client::realtime::transport::{Transport, TransportCloser, TransportEvents};
use crate::client::session::SessionStore;
use crate::client::ticket::TicketExchange;
use crate::shared::error::{RefreshError, TicketError};
use crate::shared::event::{NotificationEvent, TransportEvent};
use crate::shared::token::AccessToken;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamState {
    Idle,
    FetchingTicket,
    Connecting,
    Open,
    Reconnecting,
    Closed,
    Failed,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingTicket => "fetching_ticket",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the connection, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSnapshot {
    pub state: StreamState,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub generation: u64,
}

/// Tunables taken from configuration
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub backoff: Backoff,
    pub unseen_count_event: String,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            backoff: Backoff::default(),
            unseen_count_event: "unseen-count".to_string(),
        }
    }
}

impl StreamOptions {
    pub fn from_config(config: &Config) -> Self {
        let app = config.app();
        Self {
            backoff: Backoff::new(app.backoff_base(), app.backoff_cap()),
            unseen_count_event: app.unseen_count_event.clone(),
        }
    }
}

struct Connection {
    state: StreamState,
    retry_count: u32,
    last_error: Option<String>,
    generation: u64,
    /// Token the current run's ticket was issued for or refused with
    bound_token: Option<AccessToken>,
    transport: Option<TransportCloser>,
    run: Option<JoinHandle<()>>,
}

impl Connection {
    fn release_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }
}

struct Shared {
    conn: Mutex<Connection>,
    session: Arc<dyn SessionStore>,
    tickets: Arc<dyn TicketExchange>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn NotificationSink>,
    options: StreamOptions,
}

/// Handle to the stream state machine; clones share one connection
#[derive(Clone)]
pub struct NotificationStreamManager {
    shared: Arc<Shared>,
}

impl NotificationStreamManager {
    pub fn new(
        session: Arc<dyn SessionStore>,
        tickets: Arc<dyn TicketExchange>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn NotificationSink>,
        options: StreamOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                conn: Mutex::new(Connection {
                    state: StreamState::Idle,
                    retry_count: 0,
                    last_error: None,
                    generation: 0,
                    bound_token: None,
                    transport: None,
                    run: None,
                }),
                session,
                tickets,
                transport,
                sink,
                options,
            }),
        }
    }

    /// Begin a fresh run; an existing run is torn down first
    pub async fn start(&self) {
        let mut conn = self.shared.conn.lock().await;
        self.start_locked(&mut conn);
    }

    /// React to the session moving to `token` while the stream is wanted.
    ///
    /// Restarts unless the current run already covers `token`. A run still
    /// fetching its ticket is left alone: it checks the session once the
    /// ticket arrives. Returns whether a new run began.
    pub async fn rebind(&self, token: &AccessToken) -> bool {
        let mut conn = self.shared.conn.lock().await;
        match conn.state {
            StreamState::Idle | StreamState::Closed => {}
            StreamState::FetchingTicket => {
                tracing::debug!("token changed during ticket request, run will pick it up");
                return false;
            }
            state if conn.bound_token.as_ref() == Some(token) => {
                tracing::debug!(%state, "run already bound to this token");
                return false;
            }
            _ => {}
        }
        self.start_locked(&mut conn);
        true
    }

    fn start_locked(&self, conn: &mut Connection) {
        if conn.run.is_some() || conn.transport.is_some() {
            tracing::debug!(state = %conn.state, "restarting notification stream");
            self.shared.teardown(conn);
        }

        conn.generation += 1;
        conn.retry_count = 0;
        conn.last_error = None;
        conn.bound_token = None;
        conn.state = StreamState::FetchingTicket;
        let generation = conn.generation;

        let shared = self.shared.clone();
        conn.run = Some(tokio::spawn(shared.run(generation)));
        tracing::info!(generation, "notification stream started");
    }

    /// Stop from any state; idempotent
    pub async fn stop(&self) {
        let mut conn = self.shared.conn.lock().await;
        self.shared.teardown(&mut conn);
    }

    pub async fn snapshot(&self) -> StreamSnapshot {
        let conn = self.shared.conn.lock().await;
        StreamSnapshot {
            state: conn.state,
            retry_count: conn.retry_count,
            last_error: conn.last_error.clone(),
            generation: conn.generation,
        }
    }

    pub async fn state(&self) -> StreamState {
        self.shared.conn.lock().await.state
    }

    /// Handle that does not keep the manager alive
    pub fn downgrade(&self) -> WeakStreamManager {
        WeakStreamManager {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

#[async_trait]
impl SessionTeardown for NotificationStreamManager {
    async fn on_session_lost(&self, reason: &RefreshError) {
        tracing::warn!(%reason, "session lost, closing notification stream");
        self.stop().await;
    }
}

/// Teardown hook that lets the refresh coordinator reach the manager
/// without the two owning each other.
#[derive(Clone)]
pub struct WeakStreamManager {
    shared: Weak<Shared>,
}

#[async_trait]
impl SessionTeardown for WeakStreamManager {
    async fn on_session_lost(&self, reason: &RefreshError) {
        if let Some(shared) = self.shared.upgrade() {
            NotificationStreamManager { shared }.on_session_lost(reason).await;
        }
    }
}

impl Shared {
    /// Invalidate the current run and move to `Closed`
    fn teardown(&self, conn: &mut Connection) {
        conn.generation += 1;
        if let Some(run) = conn.run.take() {
            run.abort();
        }
        conn.release_transport();
        let previous = conn.state;
        conn.state = StreamState::Closed;
        self.sink.set_connected(false);
        tracing::info!(from = %previous, generation = conn.generation, "notification stream closed");
    }

    async fn run(self: Arc<Self>, generation: u64) {
        let run_id = Uuid::new_v4();
        tracing::debug!(%run_id, generation, "stream run begins");

        loop {
            if !self.enter(generation, StreamState::FetchingTicket).await {
                return;
            }

            // Never cached: a refresh since the last attempt must be picked up.
            let token = self.session.access_token();
            let ticket = match self.tickets.get_ticket(token.as_ref()).await {
                Ok(ticket) => ticket,
                Err(error) if error.is_terminal() => {
                    // Still refused after the refresh underneath, so the
                    // token that refresh produced is spent as well.
                    let refused = if matches!(error, TicketError::Unauthorized) {
                        self.session.access_token()
                    } else {
                        token
                    };
                    self.fail(generation, error.to_string(), refused).await;
                    return;
                }
                Err(error) => {
                    tracing::warn!(%run_id, %error, "ticket exchange failed");
                    if !self.reconnect(generation, error.to_string()).await {
                        return;
                    }
                    continue;
                }
            };

            let events = {
                let mut conn = self.conn.lock().await;
                if conn.generation != generation {
                    return;
                }
                let current = self.session.access_token();
                if current.as_ref() != Some(ticket.issued_for()) {
                    tracing::debug!(%run_id, "session token moved during ticket request, fetching again");
                    continue;
                }
                conn.bound_token = current;
                conn.state = StreamState::Connecting;
                let (events, closer) = self.transport.open(ticket).split();
                tracing::debug!(%run_id, transport = %closer.id(), "connecting");
                conn.transport = Some(closer);
                events
            };

            match self.pump(generation, run_id, events).await {
                Some(reason) => {
                    if !self.reconnect(generation, reason).await {
                        return;
                    }
                }
                None => return,
            }
        }
    }

    /// Set `state` if `generation` is still current
    async fn enter(&self, generation: u64, state: StreamState) -> bool {
        let mut conn = self.conn.lock().await;
        if conn.generation != generation {
            return false;
        }
        conn.state = state;
        true
    }

    /// Feed transport events into the state machine.
    ///
    /// Returns why the transport ended, or `None` once the run is stale.
    async fn pump(&self, generation: u64, run_id: Uuid, mut events: TransportEvents) -> Option<String> {
        loop {
            let event = events.next().await;
            let mut conn = self.conn.lock().await;
            if conn.generation != generation {
                return None;
            }

            match event {
                TransportEvent::Open => {
                    if conn.state != StreamState::Connecting {
                        continue;
                    }
                    conn.state = StreamState::Open;
                    conn.retry_count = 0;
                    conn.last_error = None;
                    self.sink.set_connected(true);
                    self.sink.set_error(None);
                    tracing::info!(%run_id, transport = %events.id(), "notification stream open");
                }
                TransportEvent::Message { name, data } => {
                    if conn.state != StreamState::Open {
                        tracing::debug!(%run_id, event = %name, "event before open dropped");
                        continue;
                    }
                    self.dispatch(run_id, &name, &data);
                }
                TransportEvent::Error(reason) => return Some(reason),
                TransportEvent::Closed => return Some("stream closed by server".to_string()),
            }
        }
    }

    fn dispatch(&self, run_id: Uuid, name: &str, data: &str) {
        match NotificationEvent::parse(&self.options.unseen_count_event, name, data) {
            Ok(NotificationEvent::UnseenCount(count)) => {
                tracing::debug!(%run_id, count, "unseen count");
                self.sink.set_count(count);
            }
            Ok(NotificationEvent::Unknown(name)) => {
                tracing::debug!(%run_id, event = %name, "ignoring unknown event");
            }
            Err(error) => {
                tracing::warn!(%run_id, event = %name, %error, "malformed event payload ignored");
            }
        }
    }

    /// Enter `Reconnecting` and wait out the backoff.
    ///
    /// Returns false if the run went stale before the timer was armed.
    async fn reconnect(&self, generation: u64, reason: String) -> bool {
        let (attempt, delay) = {
            let mut conn = self.conn.lock().await;
            if conn.generation != generation {
                return false;
            }
            conn.release_transport();
            conn.state = StreamState::Reconnecting;
            conn.retry_count = conn.retry_count.saturating_add(1);
            conn.last_error = Some(reason.clone());
            self.sink.set_connected(false);
            (conn.retry_count, self.options.backoff.delay(conn.retry_count))
        };

        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            %reason,
            "notification stream lost, reconnecting"
        );
        tokio::time::sleep(delay).await;
        true
    }

    async fn fail(&self, generation: u64, message: String, refused: Option<AccessToken>) {
        let mut conn = self.conn.lock().await;
        if conn.generation != generation {
            return;
        }
        conn.release_transport();
        conn.bound_token = refused;
        conn.state = StreamState::Failed;
        conn.last_error = Some(message.clone());
        // This is the running task; dropping its handle just detaches it.
        conn.run = None;
        self.sink.set_connected(false);
        self.sink.set_error(Some(message.clone()));
        tracing::error!(error = %message, "notification stream failed");
    }
}
