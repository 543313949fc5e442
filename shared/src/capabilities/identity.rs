use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

use super::subscription::{Listener, ListenerSet, Subscription};
use crate::model::UserId;

/// What the identity backend reports on every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityNotice {
    SignedIn(UserId),
    SignedOut,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum IdentityError {
    #[error("bootstrap token rejected: {reason}")]
    TokenRejected { reason: String },

    #[error("anonymous sign-in failed: {reason}")]
    AnonymousSignInFailed { reason: String },

    #[error("identity service unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Identity backend. Notices are delivered through the callback for as long
/// as the returned [`Subscription`] is held.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    fn subscribe(&self, listener: Listener<IdentityNotice>) -> Subscription;

    async fn redeem_token(&self, token: &SecretString) -> Result<UserId, IdentityError>;

    async fn sign_in_anonymously(&self) -> Result<UserId, IdentityError>;
}

/// In-process identity backend. New subscribers receive the current notice
/// immediately, matching how hosted auth SDKs replay their state.
#[derive(Default)]
pub struct MemoryIdentityService {
    current: Mutex<Option<UserId>>,
    listeners: ListenerSet<IdentityNotice>,
    reject_token: AtomicBool,
    reject_anonymous: AtomicBool,
    token_redemptions: AtomicUsize,
    anonymous_sign_ins: AtomicUsize,
}

impl MemoryIdentityService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a user already signed in.
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        let service = Self::default();
        *service.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(user);
        service
    }

    pub fn reject_token(&self, reject: bool) {
        self.reject_token.store(reject, Ordering::SeqCst);
    }

    pub fn reject_anonymous(&self, reject: bool) {
        self.reject_anonymous.store(reject, Ordering::SeqCst);
    }

    pub fn token_redemptions(&self) -> usize {
        self.token_redemptions.load(Ordering::SeqCst)
    }

    pub fn anonymous_sign_ins(&self) -> usize {
        self.anonymous_sign_ins.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sign_out(&self) {
        self.transition(None);
    }

    /// Re-delivers the current state to every subscriber.
    pub fn replay(&self) {
        self.listeners.emit(&Self::notice(self.current_user()));
    }

    fn notice(user: Option<UserId>) -> IdentityNotice {
        user.map_or(IdentityNotice::SignedOut, IdentityNotice::SignedIn)
    }

    fn transition(&self, user: Option<UserId>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = user.clone();
        self.listeners.emit(&Self::notice(user));
    }
}

#[async_trait::async_trait]
impl IdentityService for MemoryIdentityService {
    fn subscribe(&self, listener: Listener<IdentityNotice>) -> Subscription {
        let initial = Self::notice(self.current_user());
        let subscription = self.listeners.subscribe(listener.clone());
        listener(initial);
        subscription
    }

    async fn redeem_token(&self, token: &SecretString) -> Result<UserId, IdentityError> {
        self.token_redemptions.fetch_add(1, Ordering::SeqCst);
        if token.expose_secret().trim().is_empty() {
            return Err(IdentityError::TokenRejected {
                reason: "empty token".into(),
            });
        }
        if self.reject_token.load(Ordering::SeqCst) {
            return Err(IdentityError::TokenRejected {
                reason: "token expired".into(),
            });
        }
        let user = UserId::new(format!("token-{}", uuid::Uuid::new_v4()));
        info!(user = %user, "bootstrap token redeemed");
        self.transition(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in_anonymously(&self) -> Result<UserId, IdentityError> {
        self.anonymous_sign_ins.fetch_add(1, Ordering::SeqCst);
        if self.reject_anonymous.load(Ordering::SeqCst) {
            return Err(IdentityError::AnonymousSignInFailed {
                reason: "anonymous sign-in disabled".into(),
            });
        }
        let user = UserId::new(uuid::Uuid::new_v4().to_string());
        debug!(user = %user, "anonymous identity created");
        self.transition(Some(user.clone()));
        Ok(user)
    }
}
