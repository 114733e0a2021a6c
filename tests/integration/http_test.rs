//! HTTP collaborators against a mock backend

use crate::common::{config_for, ticket_envelope};
use assert_matches::assert_matches;
use feedlink::client::api::{build_http_client, AuthorizedClient};
use feedlink::client::auth::{HttpTokenRenewer, RefreshCoordinator, TokenRenewer};
use feedlink::client::config::Config;
use feedlink::client::session::{MemorySession, SessionStore};
use feedlink::client::ticket::{HttpTicketClient, TicketExchange};
use feedlink::shared::error::{ApiError, RefreshError, TicketError};
use feedlink::shared::token::{AccessToken, RefreshCredential};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token(raw: &str) -> AccessToken {
    AccessToken::new(raw).unwrap()
}

struct Wired {
    config: Config,
    session: Arc<MemorySession>,
    api: AuthorizedClient,
}

fn wire(server: &MockServer) -> Wired {
    let config = config_for(server);
    let http = build_http_client(&config).unwrap();
    let session = Arc::new(MemorySession::new(Some(token("old")), RefreshCredential::new("r1")));
    let renewer = Arc::new(HttpTokenRenewer::new(&config, http.clone()));
    let refresher = Arc::new(RefreshCoordinator::new(renewer, session.clone()));
    let api = AuthorizedClient::new(http, session.clone(), refresher);
    Wired { config, session, api }
}

async fn mount_renew(server: &MockServer, new_token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/renew-token"))
        .and(header("cookie", "refreshToken=r1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("authorization", format!("Bearer {new_token}").as_str())
                .insert_header("set-cookie", "refreshToken=r2; Path=/; HttpOnly")
                .set_body_json(json!({ "success": true })),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_renew_reads_header_and_rotated_cookie() {
    let server = MockServer::start().await;
    mount_renew(&server, "fresh", 1).await;
    let config = config_for(&server);
    let renewer = HttpTokenRenewer::new(&config, build_http_client(&config).unwrap());

    let renewed = renewer.renew(RefreshCredential::new("r1")).await.unwrap();
    assert_eq!(renewed.access, token("fresh"));
    assert_eq!(renewed.refresh, RefreshCredential::new("r2"));
}

#[tokio::test]
async fn test_renew_falls_back_to_body_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/renew-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "from-body" })))
        .mount(&server)
        .await;
    let config = config_for(&server);
    let renewer = HttpTokenRenewer::new(&config, build_http_client(&config).unwrap());

    let renewed = renewer.renew(RefreshCredential::new("r1")).await.unwrap();
    assert_eq!(renewed.access, token("from-body"));
    assert_eq!(renewed.refresh, None);
}

#[tokio::test]
async fn test_renew_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/renew-token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token expired"))
        .mount(&server)
        .await;
    let config = config_for(&server);
    let renewer = HttpTokenRenewer::new(&config, build_http_client(&config).unwrap());

    let error = renewer.renew(RefreshCredential::new("r1")).await.unwrap_err();
    assert_eq!(error, RefreshError::rejected(401, "refresh token expired"));
}

#[tokio::test]
async fn test_renew_without_token_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/renew-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;
    let config = config_for(&server);
    let renewer = HttpTokenRenewer::new(&config, build_http_client(&config).unwrap());

    let error = renewer.renew(RefreshCredential::new("r1")).await.unwrap_err();
    assert_matches!(error, RefreshError::MalformedResponse(_));
}

#[tokio::test]
async fn test_authorized_client_refreshes_once_and_retries() {
    let server = MockServer::start().await;
    mount_renew(&server, "new", 1).await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("me"))
        .mount(&server)
        .await;

    let w = wire(&server);
    let url = w.config.api_url("/api/me");
    let response = w.api.send(|http| http.get(&url)).await.unwrap();

    assert_eq!(response.text().await.unwrap(), "me");
    assert_eq!(w.session.access_token(), Some(token("new")));
    assert_eq!(w.session.refresh_credential(), RefreshCredential::new("r2"));
}

#[tokio::test]
async fn test_concurrent_unauthorized_calls_share_one_renewal() {
    let server = MockServer::start().await;
    mount_renew(&server, "new", 1).await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let w = wire(&server);
    let url = w.config.api_url("/api/me");
    let calls: Vec<_> = (0..5)
        .map(|_| {
            let api = w.api.clone();
            let url = url.clone();
            tokio::spawn(async move { api.send(|http| http.get(&url)).await.map(|r| r.status()) })
        })
        .collect();

    for call in calls {
        assert_eq!(call.await.unwrap().unwrap(), reqwest::StatusCode::OK);
    }
    // The renew mock's `expect(1)` is verified when the server drops.
}

#[tokio::test]
async fn test_second_unauthorized_is_returned() {
    let server = MockServer::start().await;
    mount_renew(&server, "new", 1).await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let w = wire(&server);
    let url = w.config.api_url("/api/me");
    let error = w.api.send(|http| http.get(&url)).await.unwrap_err();
    assert_eq!(error, ApiError::Unauthorized);
}

#[tokio::test]
async fn test_failed_refresh_surfaces_and_clears_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/renew-token"))
        .respond_with(ResponseTemplate::new(403).set_body_string("revoked"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let w = wire(&server);
    let url = w.config.api_url("/api/me");
    let error = w.api.send(|http| http.get(&url)).await.unwrap_err();

    assert_eq!(error, ApiError::Refresh(RefreshError::rejected(403, "revoked")));
    assert!(w.session.access_token().is_none());
}

#[tokio::test]
async fn test_other_status_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let w = wire(&server);
    let url = w.config.api_url("/api/me");
    let error = w.api.send(|http| http.get(&url)).await.unwrap_err();
    assert_eq!(
        error,
        ApiError::Status {
            status: 500,
            message: "boom".into()
        }
    );
}

#[tokio::test]
async fn test_ticket_exchange_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .and(header("authorization", "Bearer old"))
        .and(body_string("{}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ticket_envelope("  tkt-0123456789abcdef  ")))
        .expect(1)
        .mount(&server)
        .await;

    let w = wire(&server);
    let tickets = HttpTicketClient::new(&w.config, w.api.clone());
    let ticket = tickets.get_ticket(Some(&token("old"))).await.unwrap();

    assert_eq!(ticket.value(), "tkt-0123456789abcdef");
    assert_eq!(ticket.issued_for(), &token("old"));
    assert_eq!(ticket.masked(), "tkt-01...abcdef");
}

#[tokio::test]
async fn test_ticket_exchange_after_refresh_is_bound_to_new_token() {
    let server = MockServer::start().await;
    mount_renew(&server, "new", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ticket_envelope("ticket-after-refresh")))
        .mount(&server)
        .await;

    let w = wire(&server);
    let tickets = HttpTicketClient::new(&w.config, w.api.clone());
    let ticket = tickets.get_ticket(Some(&token("old"))).await.unwrap();
    assert_eq!(ticket.issued_for(), &token("new"));
}

#[tokio::test]
async fn test_ticket_exchange_errors() {
    let server = MockServer::start().await;
    let w = wire(&server);
    let tickets = HttpTicketClient::new(&w.config, w.api.clone());

    // No token: no request at all.
    assert_eq!(tickets.get_ticket(None).await.unwrap_err(), TicketError::MissingCredential);

    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert_eq!(
        tickets.get_ticket(Some(&token("old"))).await.unwrap_err(),
        TicketError::Unauthorized
    );

    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert_eq!(
        tickets.get_ticket(Some(&token("old"))).await.unwrap_err(),
        TicketError::server(503, "down")
    );

    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "ticket store unavailable",
            "data": null,
            "errors": ["redis timeout"]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert_matches!(
        tickets.get_ticket(Some(&token("old"))).await.unwrap_err(),
        TicketError::MalformedResponse(reason) if reason.contains("redis timeout")
    );

    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ticket_envelope("short")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert_matches!(
        tickets.get_ticket(Some(&token("old"))).await.unwrap_err(),
        TicketError::InvalidTicket(_)
    );
}
