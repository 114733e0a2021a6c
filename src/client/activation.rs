//! # Stream Activation
//!
//! Whether a notification stream should exist at all:
//!
//! ```text
//! should_be_active = token present && (onboarding complete || privileged role)
//! ```
//!
//! The policy only remembers what it decided last time, so it can tell edges
//! apart. A token that changes while the stream is active counts as an edge
//! too: any ticket request still in flight is bound to the old token.
//!
//! The driver hands that second kind of edge to
//! [`NotificationStreamManager::rebind`] rather than restarting outright. A
//! ticket request that refreshed the token itself would otherwise restart
//! its own run on every renewal.

use crate::client::realtime::NotificationStreamManager;
use crate::shared::token::AccessToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

/// Account role as the backend reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Privileged roles get the stream before finishing onboarding
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Profile state that gates the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileFlags {
    pub onboarding_complete: bool,
    pub role: Role,
}

/// Everything the policy looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationInputs {
    pub access_token: Option<AccessToken>,
    pub onboarding_complete: bool,
    pub role: Role,
}

impl ActivationInputs {
    pub fn new(access_token: Option<AccessToken>, profile: ProfileFlags) -> Self {
        Self {
            access_token,
            onboarding_complete: profile.onboarding_complete,
            role: profile.role,
        }
    }
}

/// What the stream manager should do after an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationDecision {
    Keep,
    Stop,
    Restart,
}

#[derive(Debug, Default)]
pub struct StreamActivationPolicy {
    was_active: bool,
    last_token: Option<AccessToken>,
}

impl StreamActivationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.was_active
    }

    /// Token the last activation or token change was decided on
    pub fn active_token(&self) -> Option<&AccessToken> {
        self.last_token.as_ref()
    }

    pub fn evaluate(&mut self, inputs: &ActivationInputs) -> ActivationDecision {
        self.evaluate_at(inputs, Utc::now())
    }

    /// Evaluate with an explicit clock for the token expiry check
    pub fn evaluate_at(&mut self, inputs: &ActivationInputs, now: DateTime<Utc>) -> ActivationDecision {
        let token = inputs
            .access_token
            .as_ref()
            .filter(|token| token.is_usable_at(now))
            .cloned();
        let should_be_active =
            token.is_some() && (inputs.onboarding_complete || inputs.role.is_privileged());

        match (self.was_active, should_be_active) {
            (false, false) => ActivationDecision::Keep,
            (true, false) => {
                self.was_active = false;
                self.last_token = None;
                ActivationDecision::Stop
            }
            (false, true) => {
                self.was_active = true;
                self.last_token = token;
                ActivationDecision::Restart
            }
            (true, true) if token != self.last_token => {
                self.last_token = token;
                ActivationDecision::Restart
            }
            (true, true) => ActivationDecision::Keep,
        }
    }
}

/// Applies policy decisions to a stream manager
pub struct ActivationDriver {
    policy: Mutex<StreamActivationPolicy>,
    manager: NotificationStreamManager,
}

impl ActivationDriver {
    pub fn new(manager: NotificationStreamManager) -> Self {
        Self {
            policy: Mutex::new(StreamActivationPolicy::new()),
            manager,
        }
    }

    pub fn manager(&self) -> &NotificationStreamManager {
        &self.manager
    }

    /// Re-evaluate and act; decisions are applied one at a time
    pub async fn observe(&self, inputs: ActivationInputs) -> ActivationDecision {
        let mut policy = self.policy.lock().await;
        let was_active = policy.is_active();
        let decision = policy.evaluate(&inputs);
        match decision {
            ActivationDecision::Keep => {}
            ActivationDecision::Stop => {
                tracing::info!("stream no longer wanted, stopping");
                self.manager.stop().await;
            }
            ActivationDecision::Restart if was_active => {
                if let Some(token) = policy.active_token() {
                    if self.manager.rebind(token).await {
                        tracing::info!("session token changed, stream restarted");
                    }
                }
            }
            ActivationDecision::Restart => {
                tracing::info!(role = ?inputs.role, "starting notification stream");
                self.manager.stop().await;
                self.manager.start().await;
            }
        }
        decision
    }

    /// Re-evaluate on every session or profile change until both channels close
    pub async fn run(
        &self,
        mut session_rx: watch::Receiver<Option<AccessToken>>,
        mut profile_rx: watch::Receiver<ProfileFlags>,
    ) {
        let mut session_open = true;
        let mut profile_open = true;

        loop {
            let inputs = ActivationInputs::new(
                session_rx.borrow_and_update().clone(),
                *profile_rx.borrow_and_update(),
            );
            self.observe(inputs).await;

            let mut changed = false;
            while !changed && (session_open || profile_open) {
                tokio::select! {
                    result = session_rx.changed(), if session_open => match result {
                        Ok(()) => changed = true,
                        Err(_) => session_open = false,
                    },
                    result = profile_rx.changed(), if profile_open => match result {
                        Ok(()) => changed = true,
                        Err(_) => profile_open = false,
                    },
                }
            }
            if !changed {
                tracing::debug!("activation inputs closed");
                return;
            }
        }
    }
}
