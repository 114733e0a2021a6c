//! # Ticket Exchange Client
//!
//! Trades a valid access token for a one-time stream ticket. One request per
//! call, no retries of its own: authorization failures are surfaced as
//! `TicketError::Unauthorized`, and any refresh happens underneath in the
//! authorized HTTP client.

use crate::client::api::AuthorizedClient;
use crate::client::config::Config;
use crate::shared::error::TicketError;
use crate::shared::token::{AccessToken, Ticket};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

/// Obtains a fresh ticket for exactly one connection attempt
#[async_trait]
pub trait TicketExchange: Send + Sync {
    async fn get_ticket(&self, access_token: Option<&AccessToken>) -> Result<Ticket, TicketError>;
}

/// `{ success, message, data: { ticket }, errors, timestamp, path }`
#[derive(Debug, Deserialize)]
struct TicketEnvelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<TicketData>,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TicketData {
    ticket: Option<String>,
}

/// HTTP ticket exchange against the ticket endpoint
#[derive(Clone)]
pub struct HttpTicketClient {
    api: AuthorizedClient,
    url: String,
}

impl HttpTicketClient {
    pub fn new(config: &Config, api: AuthorizedClient) -> Self {
        Self {
            api,
            url: config.ticket_url(),
        }
    }
}

#[async_trait]
impl TicketExchange for HttpTicketClient {
    async fn get_ticket(&self, access_token: Option<&AccessToken>) -> Result<Ticket, TicketError> {
        let token = access_token.ok_or(TicketError::MissingCredential)?;

        let (response, issued_for) = self
            .api
            .send_bound(token, |http| {
                http.post(&self.url)
                    .header(CONTENT_TYPE, "application/json")
                    .body("{}")
            })
            .await
            .map_err(|err| match TicketError::from(err) {
                // The backend answers 403 for "authenticated but not allowed".
                TicketError::Server { status: 403, .. } => TicketError::Unauthorized,
                other => other,
            })?;

        let envelope: TicketEnvelope = response
            .json()
            .await
            .map_err(|e| TicketError::MalformedResponse(e.to_string()))?;

        if !envelope.success {
            let mut reason = envelope
                .message
                .unwrap_or_else(|| "ticket request unsuccessful".to_string());
            if !envelope.errors.is_empty() {
                reason = format!("{} ({})", reason, envelope.errors.join("; "));
            }
            return Err(TicketError::MalformedResponse(reason));
        }

        let raw = envelope
            .data
            .and_then(|data| data.ticket)
            .ok_or_else(|| TicketError::MalformedResponse("response carried no ticket".to_string()))?;

        // After a refresh underneath, the ticket belongs to the renewed token.
        let ticket = Ticket::issue(raw, issued_for).map_err(TicketError::InvalidTicket)?;
        tracing::debug!(ticket = %ticket.masked(), "stream ticket issued");
        Ok(ticket)
    }
}
