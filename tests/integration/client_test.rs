//! Whole client against a mock backend

use crate::common::{config_for, sse_body, ticket_envelope};
use feedlink::client::activation::{ProfileFlags, Role};
use feedlink::client::notifications::NotificationClient;
use feedlink::client::realtime::StreamState;
use feedlink::client::session::{MemorySession, SessionStore};
use feedlink::shared::token::{AccessToken, RefreshCredential};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn onboarded() -> ProfileFlags {
    ProfileFlags {
        onboarding_complete: true,
        role: Role::User,
    }
}

fn session() -> Arc<MemorySession> {
    Arc::new(MemorySession::new(
        AccessToken::new("live-token"),
        RefreshCredential::new("r1"),
    ))
}

async fn wait_for_state(client: &NotificationClient, wanted: StreamState) {
    timeout(Duration::from_secs(5), async {
        while client.manager().state().await != wanted {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stream reached expected state");
}

/// Renew endpoint handing out `renewed-N`, a new token on every call
async fn mount_rotating_renew(server: &MockServer) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    Mock::given(method("POST"))
        .and(path("/api/auth/renew-token"))
        .respond_with(move |_: &Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            ResponseTemplate::new(200).insert_header("authorization", format!("Bearer renewed-{n}").as_str())
        })
        .mount(server)
        .await;
    calls
}

async fn ticket_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/api/auth/sse-ticket")
        .count()
}

#[tokio::test]
async fn test_unseen_count_flows_to_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .and(header("authorization", "Bearer live-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ticket_envelope("ticket-e2e-000001")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/notifications/stream"))
        .and(query_param("ticket", "ticket-e2e-000001"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&[("unseen-count", "5")]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let client = NotificationClient::new(config_for(&server), session()).await.unwrap();
    let mut updates = client.store().subscribe();
    let (_profile_tx, profile_rx) = watch::channel(onboarded());
    let activation = client.spawn_activation(profile_rx);

    let state = timeout(Duration::from_secs(5), updates.wait_for(|s| s.unseen_count == 5))
        .await
        .expect("count within 5s")
        .unwrap()
        .clone();
    assert_eq!(state.unseen_count, 5);
    assert!(state.updated_at.is_some());

    client.logout().await;
    wait_for_state(&client, StreamState::Closed).await;
    assert!(!client.store().snapshot().connected);
    activation.abort();
}

#[tokio::test]
async fn test_failed_refresh_closes_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/renew-token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh expired"))
        .expect(1)
        .mount(&server)
        .await;

    let session = session();
    let client = NotificationClient::new(config_for(&server), session.clone()).await.unwrap();
    let (_profile_tx, profile_rx) = watch::channel(onboarded());
    let activation = client.spawn_activation(profile_rx);

    timeout(Duration::from_secs(5), async {
        while session.access_token().is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session cleared by failed refresh");
    wait_for_state(&client, StreamState::Closed).await;

    // Nothing restarts it without a new token.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.manager().state().await, StreamState::Closed);
    activation.abort();
}

#[tokio::test]
async fn test_ticket_retry_after_refresh_opens_stream() {
    let server = MockServer::start().await;
    let renewals = mount_rotating_renew(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .and(header("authorization", "Bearer live-token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .and(header("authorization", "Bearer renewed-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ticket_envelope("ticket-after-renew-01")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/notifications/stream"))
        .and(query_param("ticket", "ticket-after-renew-01"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&[("unseen-count", "3")]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let session = session();
    let client = NotificationClient::new(config_for(&server), session.clone()).await.unwrap();
    let mut updates = client.store().subscribe();
    let (_profile_tx, profile_rx) = watch::channel(onboarded());
    let activation = client.spawn_activation(profile_rx);

    timeout(Duration::from_secs(5), updates.wait_for(|s| s.unseen_count == 3))
        .await
        .expect("count within 5s")
        .unwrap();
    assert_eq!(session.access_token(), AccessToken::new("renewed-1"));

    // Reconnects keep using the renewed token; nothing refreshes again.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(renewals.load(Ordering::SeqCst), 1);

    client.logout().await;
    activation.abort();
}

#[tokio::test]
async fn test_ticket_refused_after_refresh_stays_failed() {
    let server = MockServer::start().await;
    let renewals = mount_rotating_renew(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/sse-ticket"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let session = session();
    let client = NotificationClient::new(config_for(&server), session.clone()).await.unwrap();
    let (_profile_tx, profile_rx) = watch::channel(onboarded());
    let activation = client.spawn_activation(profile_rx);

    wait_for_state(&client, StreamState::Failed).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(client.manager().state().await, StreamState::Failed);
    assert_eq!(renewals.load(Ordering::SeqCst), 1);
    assert_eq!(ticket_requests(&server).await, 2);
    assert_eq!(session.access_token(), AccessToken::new("renewed-1"));
    activation.abort();
}
