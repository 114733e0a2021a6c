/**
 * Event Stream Transport
 *
 * `Transport::open` consumes a ticket and returns a handle immediately; what
 * happens next arrives as `TransportEvent`s on the handle's channel. The SSE
 * implementation runs the HTTP request in its own task and closes by
 * aborting it.
 */
use crate::client::config::Config;
use crate::shared::event::TransportEvent;
use crate::shared::token::Ticket;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Opens one event stream per ticket
pub trait Transport: Send + Sync {
    fn open(&self, ticket: Ticket) -> TransportHandle;
}

/// Live connection: an event receiver plus a way to close it
#[derive(Debug)]
pub struct TransportHandle {
    id: Uuid,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    /// `task`, if given, is aborted on close
    pub fn new(events: mpsc::UnboundedReceiver<TransportEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            events,
            task,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Split into the event side and the close side
    pub fn split(self) -> (TransportEvents, TransportCloser) {
        (
            TransportEvents {
                id: self.id,
                events: self.events,
            },
            TransportCloser {
                id: self.id,
                task: self.task,
            },
        )
    }
}

/// Event side of a transport
#[derive(Debug)]
pub struct TransportEvents {
    id: Uuid,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportEvents {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event; a dropped sender reads as `Closed`
    pub async fn next(&mut self) -> TransportEvent {
        self.events.recv().await.unwrap_or(TransportEvent::Closed)
    }
}

/// Close side of a transport; closing twice is harmless
#[derive(Debug)]
pub struct TransportCloser {
    id: Uuid,
    task: Option<JoinHandle<()>>,
}

impl TransportCloser {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(transport = %self.id, "transport closed");
        }
    }
}

impl Drop for TransportCloser {
    fn drop(&mut self) {
        self.close();
    }
}

/// Server-sent events over a long-lived HTTP GET
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: Client,
    config: Config,
}

impl SseTransport {
    /// `client` must not carry a total request timeout; the stream is meant to stay open
    pub fn new(config: Config, client: Client) -> Self {
        Self { client, config }
    }

    /// Client suited to event streams: connect timeout only
    pub fn build_client(config: &Config) -> Result<Client, reqwest::Error> {
        Client::builder()
            .connect_timeout(config.app().connect_timeout())
            .build()
    }
}

impl Transport for SseTransport {
    fn open(&self, ticket: Ticket) -> TransportHandle {
        let masked = ticket.masked();
        let url = self.config.stream_url(&ticket.into_value());
        let client = self.client.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        tracing::debug!(ticket = %masked, path = url.path(), "opening event stream");

        let task = tokio::spawn(async move {
            let response = match client
                .get(url)
                .header(ACCEPT, "text/event-stream")
                .header(CACHE_CONTROL, "no-cache")
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let _ = tx.send(TransportEvent::Error(format!("network: {}", e)));
                    return;
                }
            };

            if !response.status().is_success() {
                let _ = tx.send(TransportEvent::Error(format!("http: {}", response.status())));
                return;
            }

            if tx.send(TransportEvent::Open).is_err() {
                return;
            }

            let mut stream = response.bytes_stream().eventsource();
            while let Some(item) = stream.next().await {
                let event = match item {
                    Ok(event) => TransportEvent::Message {
                        name: event.event,
                        data: event.data,
                    },
                    Err(e) => {
                        let _ = tx.send(TransportEvent::Error(format!("stream: {}", e)));
                        return;
                    }
                };
                if tx.send(event).is_err() {
                    // Receiver gone; nobody is listening any more.
                    return;
                }
            }

            let _ = tx.send(TransportEvent::Closed);
        });

        TransportHandle::new(rx, Some(task))
    }
}
