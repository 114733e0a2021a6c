//! # Notification Client
//!
//! One-stop assembly of the notification channel for a host application.
//!
//! ```text
//! Config ─▶ HttpTokenRenewer ─▶ RefreshCoordinator ─▶ AuthorizedClient
//!                                      │                     │
//!                                      │ teardown      HttpTicketClient
//!                                      ▼                     │
//!                          NotificationStreamManager ◀───────┘
//!                                      ▲         │
//!                            ActivationDriver    └─▶ NotificationStore
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use feedlink::client::{Config, MemorySession, NotificationClient, ProfileFlags};
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! # async fn example() -> Result<(), feedlink::shared::SetupError> {
//! let session = Arc::new(MemorySession::default());
//! let client = NotificationClient::new(Config::load()?, session).await?;
//!
//! let (_profile_tx, profile_rx) = watch::channel(ProfileFlags::default());
//! let _activation = client.spawn_activation(profile_rx);
//! let mut updates = client.store().subscribe();
//! while updates.changed().await.is_ok() {
//!     println!("unseen: {}", updates.borrow().unseen_count);
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::activation::{ActivationDriver, ProfileFlags};
use crate::client::api::{build_http_client, AuthorizedClient};
use crate::client::auth::{HttpTokenRenewer, RefreshCoordinator};
use crate::client::config::Config;
use crate::client::realtime::{NotificationStore, NotificationStreamManager, SseTransport, StreamOptions};
use crate::client::session::SessionStore;
use crate::client::ticket::HttpTicketClient;
use crate::shared::error::SetupError;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Fully wired notification channel
pub struct NotificationClient {
    config: Config,
    session: Arc<dyn SessionStore>,
    refresher: Arc<RefreshCoordinator>,
    api: AuthorizedClient,
    store: Arc<NotificationStore>,
    manager: NotificationStreamManager,
    activation: Arc<ActivationDriver>,
}

impl NotificationClient {
    pub async fn new(config: Config, session: Arc<dyn SessionStore>) -> Result<Self, SetupError> {
        let http = build_http_client(&config)?;
        let renewer = Arc::new(HttpTokenRenewer::new(&config, http.clone()));
        let refresher = Arc::new(RefreshCoordinator::new(renewer, session.clone()));
        let api = AuthorizedClient::new(http, session.clone(), refresher.clone());

        let tickets = Arc::new(HttpTicketClient::new(&config, api.clone()));
        let transport = Arc::new(SseTransport::new(
            config.clone(),
            SseTransport::build_client(&config)?,
        ));
        let store = Arc::new(NotificationStore::new());

        let manager = NotificationStreamManager::new(
            session.clone(),
            tickets,
            transport,
            store.clone(),
            StreamOptions::from_config(&config),
        );
        // A dead session must take the stream down with it.
        refresher.on_session_lost(Arc::new(manager.downgrade())).await;

        let activation = Arc::new(ActivationDriver::new(manager.clone()));
        tracing::info!(server = config.server_url(), "notification client ready");

        Ok(Self {
            config,
            session,
            refresher,
            api,
            store,
            manager,
            activation,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// REST client sharing this channel's refresh coordinator
    pub fn api(&self) -> &AuthorizedClient {
        &self.api
    }

    pub fn refresher(&self) -> &Arc<RefreshCoordinator> {
        &self.refresher
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub fn manager(&self) -> &NotificationStreamManager {
        &self.manager
    }

    pub fn activation(&self) -> &Arc<ActivationDriver> {
        &self.activation
    }

    /// Drive activation from session and profile changes in the background
    pub fn spawn_activation(&self, profile_rx: watch::Receiver<ProfileFlags>) -> JoinHandle<()> {
        let driver = self.activation.clone();
        let session_rx = self.session.subscribe();
        tokio::spawn(async move { driver.run(session_rx, profile_rx).await })
    }

    /// End the session and the stream with it
    pub async fn logout(&self) {
        self.session.clear();
        self.manager.stop().await;
        tracing::info!("logged out");
    }
}
