//! # Session Store
//!
//! The session is the one piece of mutable state shared between the refresh
//! coordinator and everything that reads a token. It is injected as a
//! `SessionStore` rather than living in a global, so tests can hand each
//! component its own fake.
//!
//! Writers: the refresh coordinator (new token) and logout / terminal refresh
//! failure (cleared). Readers: the ticket client, outbound REST calls and the
//! activation policy (through `subscribe`).

use crate::shared::token::{AccessToken, RefreshCredential};
use std::sync::Mutex;
use tokio::sync::watch;

/// Injected session interface
pub trait SessionStore: Send + Sync {
    /// Current access token, read fresh on every call
    fn access_token(&self) -> Option<AccessToken>;

    /// Credential used to renew the access token
    fn refresh_credential(&self) -> Option<RefreshCredential>;

    /// Store a renewed access token; a rotated refresh credential replaces the old one
    fn set_tokens(&self, access: AccessToken, refresh: Option<RefreshCredential>);

    /// Destroy the session (logout or terminal refresh failure)
    fn clear(&self);

    /// Watch access token changes
    fn subscribe(&self) -> watch::Receiver<Option<AccessToken>>;
}

/// In-memory session backed by a watch channel.
#[derive(Debug)]
pub struct MemorySession {
    access: watch::Sender<Option<AccessToken>>,
    refresh: Mutex<Option<RefreshCredential>>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl MemorySession {
    pub fn new(access: Option<AccessToken>, refresh: Option<RefreshCredential>) -> Self {
        let (tx, _rx) = watch::channel(access);
        Self {
            access: tx,
            refresh: Mutex::new(refresh),
        }
    }

    /// Start a session after login
    pub fn login(&self, access: AccessToken, refresh: Option<RefreshCredential>) {
        self.set_tokens(access, refresh);
    }

    fn with_refresh<R>(&self, f: impl FnOnce(&mut Option<RefreshCredential>) -> R) -> R {
        // A poisoned lock only means a writer panicked; the Option is still whole.
        let mut guard = self
            .refresh
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl SessionStore for MemorySession {
    fn access_token(&self) -> Option<AccessToken> {
        self.access.borrow().clone()
    }

    fn refresh_credential(&self) -> Option<RefreshCredential> {
        self.with_refresh(|refresh| refresh.clone())
    }

    fn set_tokens(&self, access: AccessToken, refresh: Option<RefreshCredential>) {
        if let Some(refresh) = refresh {
            self.with_refresh(|slot| *slot = Some(refresh));
        }
        self.access.send_replace(Some(access));
    }

    fn clear(&self) {
        self.with_refresh(|slot| *slot = None);
        self.access.send_replace(None);
        tracing::info!("session cleared");
    }

    fn subscribe(&self) -> watch::Receiver<Option<AccessToken>> {
        self.access.subscribe()
    }
}
