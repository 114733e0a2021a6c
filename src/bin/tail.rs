/**
 * Feedlink Tail
 *
 * Connects to the notification stream with tokens taken from the environment
 * and prints every change of the notification state until Ctrl-C.
 *
 *   FEEDLINK_ACCESS_TOKEN   access token (required)
 *   FEEDLINK_REFRESH_TOKEN  refresh credential (optional)
 *   FEEDLINK_ROLE           USER or ADMIN (default USER)
 */
use feedlink::client::{Config, MemorySession, NotificationClient, ProfileFlags, Role};
use feedlink::shared::token::{AccessToken, RefreshCredential};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = Config::load()?;

    let access = std::env::var("FEEDLINK_ACCESS_TOKEN")
        .ok()
        .and_then(AccessToken::new)
        .ok_or("FEEDLINK_ACCESS_TOKEN is not set")?;
    let refresh = std::env::var("FEEDLINK_REFRESH_TOKEN")
        .ok()
        .and_then(RefreshCredential::new);
    let role = match std::env::var("FEEDLINK_ROLE").as_deref() {
        Ok("ADMIN") => Role::Admin,
        _ => Role::User,
    };

    let session = Arc::new(MemorySession::new(Some(access), refresh));
    let client = NotificationClient::new(config, session).await?;
    tracing::info!(server = client.config().server_url(), "tailing notifications");

    let (_profile_tx, profile_rx) = watch::channel(ProfileFlags {
        onboarding_complete: true,
        role,
    });
    let activation = client.spawn_activation(profile_rx);

    let mut updates = WatchStream::new(client.store().subscribe());
    loop {
        tokio::select! {
            Some(state) = updates.next() => {
                println!(
                    "connected={} unseen={} error={}",
                    state.connected,
                    state.unseen_count,
                    state.error.as_deref().unwrap_or("-")
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.logout().await;
    activation.abort();
    let snapshot = client.manager().snapshot().await;
    tracing::info!(state = %snapshot.state, retries = snapshot.retry_count, "stopped");
    Ok(())
}
