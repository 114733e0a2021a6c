//! # Token Refresh Coordinator
//!
//! Collapses concurrent refresh requests into one renewal call.
//!
//! A caller records the generation it last saw, then queues on the flight
//! lock. Whoever gets the lock first performs the renewal and bumps the
//! generation; everyone who was already queued finds the generation moved and
//! takes the stored outcome instead of calling the server again. At most one
//! renewal is ever in flight.
//!
//! A failed renewal is fatal for the session: the session is cleared and every
//! registered [`SessionTeardown`] hook runs before any waiter sees the error,
//! so no stream outlives a dead session. Each hook runs on its own task: a
//! hook may abort the very task that asked for the refresh, and the other
//! hooks still finish.

use crate::client::auth::renew::TokenRenewer;
use crate::client::session::SessionStore;
use crate::shared::error::RefreshError;
use crate::shared::token::AccessToken;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Outcome shared by every waiter of one renewal
pub type RefreshOutcome = Result<AccessToken, RefreshError>;

/// Something that must shut down when the session is lost
#[async_trait]
pub trait SessionTeardown: Send + Sync {
    async fn on_session_lost(&self, reason: &RefreshError);
}

/// Single-flight wrapper around a [`TokenRenewer`]
pub struct RefreshCoordinator {
    renewer: Arc<dyn TokenRenewer>,
    session: Arc<dyn SessionStore>,
    /// Held for the whole renewal; stores the most recent outcome
    flight: Mutex<Option<RefreshOutcome>>,
    /// Completed renewals so far
    generation: AtomicU64,
    teardown: RwLock<Vec<Arc<dyn SessionTeardown>>>,
}

impl RefreshCoordinator {
    pub fn new(renewer: Arc<dyn TokenRenewer>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            renewer,
            session,
            flight: Mutex::new(None),
            generation: AtomicU64::new(0),
            teardown: RwLock::new(Vec::new()),
        }
    }

    /// Number of renewals completed, successful or not
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Register a hook that runs on terminal refresh failure
    pub async fn on_session_lost(&self, hook: Arc<dyn SessionTeardown>) {
        self.teardown.write().await.push(hook);
    }

    /// Refresh now, joining a renewal already in flight
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_since(self.generation()).await
    }

    /// Refresh for a failure observed while the generation was `observed`.
    ///
    /// If a renewal completed after `observed`, its outcome is returned and no
    /// new renewal starts: the failure the caller saw predates that token.
    pub async fn refresh_since(&self, observed: u64) -> RefreshOutcome {
        let mut flight = self.flight.lock().await;

        if self.generation() != observed {
            if let Some(outcome) = flight.as_ref() {
                tracing::debug!(observed, current = self.generation(), "joining completed refresh");
                return outcome.clone();
            }
        }

        let outcome = self.perform().await;
        *flight = Some(outcome.clone());
        self.generation.fetch_add(1, Ordering::AcqRel);

        // Committed first: the hook may abort the task that called us.
        if let Err(error) = &outcome {
            let hooks = self.teardown.read().await.clone();
            let pending: Vec<_> = hooks
                .into_iter()
                .map(|hook| {
                    let error = error.clone();
                    tokio::spawn(async move { hook.on_session_lost(&error).await })
                })
                .collect();
            for handle in pending {
                if let Err(join_error) = handle.await {
                    tracing::error!(%join_error, "session teardown hook panicked");
                }
            }
        }
        drop(flight);

        outcome
    }

    async fn perform(&self) -> RefreshOutcome {
        tracing::info!("refreshing access token");
        let credential = self.session.refresh_credential();

        match self.renewer.renew(credential).await {
            Ok(renewed) => {
                let access = renewed.access.clone();
                self.session.set_tokens(renewed.access, renewed.refresh);
                tracing::info!("access token refreshed");
                Ok(access)
            }
            Err(error) => {
                tracing::error!(%error, "token refresh failed, ending session");
                self.session.clear();
                Err(error)
            }
        }
    }
}
