/**
 * Token Renewal
 *
 * The single network call behind a refresh. The refresh coordinator wraps it
 * with single-flight; nothing else should call it directly.
 */
use crate::client::config::Config;
use crate::shared::error::RefreshError;
use crate::shared::token::{AccessToken, RefreshCredential};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Tokens handed back by a successful renewal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewedTokens {
    pub access: AccessToken,
    /// Present when the server rotated the refresh credential
    pub refresh: Option<RefreshCredential>,
}

/// Requests a new access token given a refresh credential
#[async_trait]
pub trait TokenRenewer: Send + Sync {
    async fn renew(&self, credential: Option<RefreshCredential>) -> Result<RenewedTokens, RefreshError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewBody {
    access_token: Option<String>,
}

/// HTTP renewal against the renew-token endpoint
#[derive(Debug, Clone)]
pub struct HttpTokenRenewer {
    client: Client,
    url: String,
    cookie_name: String,
}

impl HttpTokenRenewer {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            url: config.renew_url(),
            cookie_name: config.app().refresh_cookie.clone(),
        }
    }

    /// `Authorization: Bearer …` on the response carries the new token
    fn token_from_header(response: &reqwest::Response) -> Option<AccessToken> {
        let value = response.headers().get(AUTHORIZATION)?.to_str().ok()?;
        let raw = value.strip_prefix("Bearer ").unwrap_or(value);
        AccessToken::new(raw.trim())
    }

    fn rotated_credential(&self, response: &reqwest::Response) -> Option<RefreshCredential> {
        let prefix = format!("{}=", self.cookie_name);
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookie| {
                let pair = cookie.split(';').next()?.trim();
                RefreshCredential::new(pair.strip_prefix(&prefix)?)
            })
    }
}

#[async_trait]
impl TokenRenewer for HttpTokenRenewer {
    async fn renew(&self, credential: Option<RefreshCredential>) -> Result<RenewedTokens, RefreshError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body("{}");

        // Without a stored credential the server may still accept a cookie the
        // HTTP client carries on its own, so the request goes out either way.
        if let Some(credential) = credential.as_ref() {
            request = request.header(COOKIE, format!("{}={}", self.cookie_name, credential.as_str()));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST
        ) {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            tracing::warn!(status = status.as_u16(), "token renewal rejected");
            return Err(RefreshError::rejected(status.as_u16(), message));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(RefreshError::MalformedResponse(format!("{}: {}", status, message)));
        }

        let header_token = Self::token_from_header(&response);
        let refresh = self.rotated_credential(&response);

        let access = match header_token {
            Some(token) => token,
            None => {
                let body: RenewBody = response
                    .json()
                    .await
                    .map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;
                body.access_token
                    .and_then(AccessToken::new)
                    .ok_or_else(|| {
                        RefreshError::MalformedResponse("no access token returned".to_string())
                    })?
            }
        };

        tracing::debug!(rotated = refresh.is_some(), "access token renewed");
        Ok(RenewedTokens { access, refresh })
    }
}
