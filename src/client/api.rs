/**
 * Authorized HTTP Client
 *
 * Every authenticated REST call goes through `AuthorizedClient::send`. On the
 * first 401 it asks the refresh coordinator for a new token and retries once;
 * a second 401 is returned to the caller as `ApiError::Unauthorized`.
 */
use crate::client::auth::RefreshCoordinator;
use crate::client::config::Config;
use crate::client::session::SessionStore;
use crate::shared::error::ApiError;
use crate::shared::token::AccessToken;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;

/// Build the shared REST client with the configured timeouts
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.app().request_timeout())
        .connect_timeout(config.app().connect_timeout())
        .build()
}

/// REST client with bearer auth and the refresh-and-retry-once policy
#[derive(Clone)]
pub struct AuthorizedClient {
    http: Client,
    session: Arc<dyn SessionStore>,
    refresher: Arc<RefreshCoordinator>,
}

impl AuthorizedClient {
    pub fn new(http: Client, session: Arc<dyn SessionStore>, refresher: Arc<RefreshCoordinator>) -> Self {
        Self {
            http,
            session,
            refresher,
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Send with the session's current token
    pub async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.session.access_token().ok_or(ApiError::MissingCredential)?;
        self.send_with(&token, build).await
    }

    /// Send with an explicit first token; the retry uses whatever the refresh produced
    pub async fn send_with<F>(&self, token: &AccessToken, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.send_bound(token, build).await.map(|(response, _)| response)
    }

    /// Like [`send_with`](Self::send_with), also returning the token the
    /// accepted request carried
    pub async fn send_bound<F>(&self, token: &AccessToken, build: F) -> Result<(Response, AccessToken), ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        // Taken before sending so a refresh that lands while this request is
        // in flight is recognised as newer than our failure.
        let observed = self.refresher.generation();

        let response = build(&self.http)
            .header(AUTHORIZATION, token.bearer())
            .send()
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await.map(|response| (response, token.clone()));
        }

        tracing::debug!(url = %response.url(), "401, refreshing and retrying once");
        let renewed = self.refresher.refresh_since(observed).await?;

        let retry = build(&self.http)
            .header(AUTHORIZATION, renewed.bearer())
            .send()
            .await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %retry.url(), "still unauthorized after refresh");
            return Err(ApiError::Unauthorized);
        }
        check_status(retry).await.map(|response| (response, renewed))
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let message = response.text().await.unwrap_or_else(|_| status.to_string());
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}
