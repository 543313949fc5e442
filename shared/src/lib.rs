// lib.rs - shared core: preference/profile sync, identity bootstrap, theming, navigation

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod bootstrap;
pub mod capabilities;
pub mod config;
pub mod context;
pub mod document;
pub mod event;
pub mod feedback;
pub mod model;
pub mod navigation;
pub mod preferences;
pub mod profile;
pub mod theme;
pub mod translation;

mod task;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use app::{App, Model, Overlay, ViewModel};
pub use bootstrap::{BootstrapState, IdentityBootstrap, IdentityHandle};
pub use config::{AppConfig, ConfigError, RemoteConfig};
pub use context::{Context, ContextBuilder, RemoteBackend, RemoteTarget};
pub use event::Event;
pub use model::{
    LanguageCode, PreferencesPatch, Standard, Theme, TranslationHistory, TranslationHistoryItem,
    UnixTimeMs, UserId, UserPreferences, UserProfile, ValidationError,
};
pub use navigation::{
    NavigationController, NavigationError, NavigationState, Payload, Route, Screen,
};
pub use preferences::PreferenceSync;
pub use profile::{OnboardingForm, ProfileSync};
pub use theme::ThemeResolver;

pub const FALLBACK_LANGUAGE: &str = "en";
pub const ONBOARDING_CONFIRMATION_DELAY: Duration = Duration::from_millis(1500);
pub const DOCUMENT_LOAD_TIMEOUT: Duration = Duration::from_millis(3000);
pub const ATTENTION_ANIMATION: Duration = Duration::from_millis(500);
pub const TRANSLATION_HISTORY_CAP: usize = 3;
pub const PROFILE_EDIT_UNAVAILABLE: &str = "Edit profile function will be available 2 hours later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Authentication,
    Validation,
    Serialization,
    Translation,
    FeatureUnavailable,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Authentication => "AUTH_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Translation => "TRANSLATION_ERROR",
            Self::FeatureUnavailable => "FEATURE_UNAVAILABLE",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Translation => ErrorSeverity::Transient,
            Self::Serialization => ErrorSeverity::Fatal,
            Self::Authentication | Self::Validation | Self::FeatureUnavailable => {
                ErrorSeverity::Permanent
            }
        }
    }
}

/// What the shell shows. `message` is user-safe; `internal_message` is for
/// logs only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Authentication => {
                "You are not allowed to do that right now. Please try again later.".into()
            }
            ErrorKind::Validation | ErrorKind::FeatureUnavailable => self.message.clone(),
            ErrorKind::Serialization => {
                "A data error occurred. Please contact support if this persists.".into()
            }
            ErrorKind::Translation => "Translation failed. Please try again.".into(),
        }
    }

    #[must_use]
    pub fn feature_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FeatureUnavailable, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

impl From<capabilities::RemoteError> for AppError {
    fn from(e: capabilities::RemoteError) -> Self {
        use capabilities::RemoteError;

        let kind = match &e {
            RemoteError::Unavailable { .. } | RemoteError::Transport { .. } => ErrorKind::Network,
            RemoteError::PermissionDenied { .. } => ErrorKind::Authentication,
            RemoteError::InvalidDocument { .. } => ErrorKind::Serialization,
        };
        AppError::new(kind, "Remote sync failed").with_internal(e.to_string())
    }
}

impl From<capabilities::TranslationError> for AppError {
    fn from(e: capabilities::TranslationError) -> Self {
        AppError::new(ErrorKind::Translation, "Translation failed").with_internal(e.to_string())
    }
}
