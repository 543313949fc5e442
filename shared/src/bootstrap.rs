//! Identity bootstrap state machine.
//!
//! Pure transitions: the [`App`](crate::App) feeds identity notices in and
//! performs the returned [`BootstrapStep`].

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::capabilities::{IdentityError, IdentityNotice};
use crate::model::UserId;

pub const DISCONNECTED_LABEL: &str = "offline_user";
pub const FAILED_LABEL: &str = "auth_failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityHandle {
    Identified(UserId),
    Disconnected,
    Failed,
}

impl IdentityHandle {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            IdentityHandle::Identified(user) => user.as_str(),
            IdentityHandle::Disconnected => DISCONNECTED_LABEL,
            IdentityHandle::Failed => FAILED_LABEL,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            IdentityHandle::Identified(user) => Some(user),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootstrapState {
    #[default]
    Unstarted,
    Pending,
    Resolved(IdentityHandle),
}

/// Work the caller must perform after a transition.
pub enum BootstrapStep {
    None,
    RedeemToken(SecretString),
    SignInAnonymously,
    /// Run the one-shot fetch-and-merge for this user.
    Reconcile(UserId),
}

impl fmt::Debug for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapStep::None => f.write_str("None"),
            BootstrapStep::RedeemToken(_) => f.write_str("RedeemToken([REDACTED])"),
            BootstrapStep::SignInAnonymously => f.write_str("SignInAnonymously"),
            BootstrapStep::Reconcile(user) => f.debug_tuple("Reconcile").field(user).finish(),
        }
    }
}

pub struct IdentityBootstrap {
    state: BootstrapState,
    token: Option<SecretString>,
    sign_in_in_flight: bool,
}

impl fmt::Debug for IdentityBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityBootstrap")
            .field("state", &self.state)
            .field("has_token", &self.token.is_some())
            .field("sign_in_in_flight", &self.sign_in_in_flight)
            .finish()
    }
}

impl IdentityBootstrap {
    #[must_use]
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            state: BootstrapState::Unstarted,
            token,
            sign_in_in_flight: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &BootstrapState {
        &self.state
    }

    #[must_use]
    pub fn handle(&self) -> Option<&IdentityHandle> {
        match &self.state {
            BootstrapState::Resolved(handle) => Some(handle),
            _ => None,
        }
    }

    /// Unreachable backends resolve to `Disconnected` on the spot, with no
    /// retry. Returns whether the caller should subscribe for notices.
    pub fn start(&mut self, reachable: bool) -> bool {
        if self.state != BootstrapState::Unstarted {
            debug!(state = ?self.state, "bootstrap already started");
            return false;
        }
        if reachable {
            self.state = BootstrapState::Pending;
            debug!("bootstrap pending");
            true
        } else {
            info!("no remote backend, running disconnected");
            self.token = None;
            self.state = BootstrapState::Resolved(IdentityHandle::Disconnected);
            false
        }
    }

    pub fn on_notice(&mut self, notice: IdentityNotice) -> BootstrapStep {
        let held = match &self.state {
            BootstrapState::Pending => None,
            BootstrapState::Resolved(IdentityHandle::Identified(user)) => Some(user.clone()),
            BootstrapState::Unstarted
            | BootstrapState::Resolved(IdentityHandle::Failed | IdentityHandle::Disconnected) => {
                debug!(state = ?self.state, "identity notice ignored");
                return BootstrapStep::None;
            }
        };

        match notice {
            IdentityNotice::SignedIn(user) if held.as_ref() == Some(&user) => {
                debug!("identity notice replayed");
                BootstrapStep::None
            }
            IdentityNotice::SignedIn(user) => {
                info!(user = %user, "identity acquired");
                self.sign_in_in_flight = false;
                self.state = BootstrapState::Resolved(IdentityHandle::Identified(user.clone()));
                BootstrapStep::Reconcile(user)
            }
            IdentityNotice::SignedOut if self.sign_in_in_flight => {
                debug!("sign-in already in flight");
                BootstrapStep::None
            }
            IdentityNotice::SignedOut => {
                self.sign_in_in_flight = true;
                if held.is_some() {
                    info!("signed out, creating a new anonymous identity");
                    self.state = BootstrapState::Pending;
                    return BootstrapStep::SignInAnonymously;
                }
                match self.token.take() {
                    Some(token) => {
                        debug!("redeeming bootstrap token");
                        BootstrapStep::RedeemToken(token)
                    }
                    None => BootstrapStep::SignInAnonymously,
                }
            }
        }
    }

    /// Either sign-in path failing is final for the session.
    pub fn on_sign_in_failed(&mut self, error: &IdentityError) {
        warn!(error = %error, "identity bootstrap failed, sync disabled for this session");
        self.sign_in_in_flight = false;
        self.token = None;
        self.state = BootstrapState::Resolved(IdentityHandle::Failed);
    }
}
