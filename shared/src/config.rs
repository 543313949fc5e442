use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::model::LanguageCode;

pub const REMOTE_CONFIG_ENV: &str = "GYAN_REMOTE_CONFIG";
pub const BOOTSTRAP_TOKEN_ENV: &str = "GYAN_BOOTSTRAP_TOKEN";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed connection config: {0}")]
    Malformed(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Connection blob injected by the hosting environment.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub project_id: String,
    pub api_key: SecretString,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl RemoteConfig {
    pub fn from_json(blob: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(blob).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::MissingField("projectId"));
        }
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::MissingField("apiKey"));
        }
        if let Some(endpoint) = &self.endpoint {
            let invalid = |reason: &str| ConfigError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: reason.to_string(),
            };
            let parsed = url::Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(invalid("scheme must be http or https"));
            }
            if parsed.host_str().is_none() {
                return Err(invalid("missing host"));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `None` means the app runs disconnected.
    pub remote: Option<RemoteConfig>,
    /// One-time credential. Never read from serialized config.
    #[serde(skip)]
    pub bootstrap_token: Option<SecretString>,
    pub fallback_language: String,
    pub onboarding_confirmation_delay_ms: u64,
    pub document_load_timeout_ms: u64,
    pub translation_history_cap: usize,
    pub app_version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote: None,
            bootstrap_token: None,
            fallback_language: crate::FALLBACK_LANGUAGE.to_string(),
            onboarding_confirmation_delay_ms: duration_ms(crate::ONBOARDING_CONFIRMATION_DELAY),
            document_load_timeout_ms: duration_ms(crate::DOCUMENT_LOAD_TIMEOUT),
            translation_history_cap: crate::TRANSLATION_HISTORY_CAP,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("remote", &self.remote)
            .field("bootstrap_token", &self.bootstrap_token.as_ref().map(|_| "[REDACTED]"))
            .field("fallback_language", &self.fallback_language)
            .field("onboarding_confirmation_delay_ms", &self.onboarding_confirmation_delay_ms)
            .field("document_load_timeout_ms", &self.document_load_timeout_ms)
            .field("translation_history_cap", &self.translation_history_cap)
            .field("app_version", &self.app_version)
            .finish()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl AppConfig {
    /// Reads the connection blob and bootstrap token from the environment.
    /// A malformed blob is logged and the app runs disconnected.
    #[must_use]
    pub fn from_env() -> Self {
        let remote = std::env::var(REMOTE_CONFIG_ENV)
            .ok()
            .filter(|blob| !blob.trim().is_empty())
            .and_then(|blob| match RemoteConfig::from_json(&blob) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!(error = %e, "ignoring connection config, running disconnected");
                    None
                }
            });
        let bootstrap_token = std::env::var(BOOTSTRAP_TOKEN_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::new);
        Self {
            remote,
            bootstrap_token,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn with_bootstrap_token(mut self, token: impl Into<String>) -> Self {
        self.bootstrap_token = Some(SecretString::new(token.into()));
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        self.fallback_language()?;
        if self.translation_history_cap == 0 {
            return Err(ConfigError::InvalidValue {
                field: "translation_history_cap",
                reason: "must be at least 1".into(),
            });
        }
        if self.document_load_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "document_load_timeout_ms",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn fallback_language(&self) -> Result<LanguageCode, ConfigError> {
        LanguageCode::new(self.fallback_language.as_str()).map_err(|e| ConfigError::InvalidValue {
            field: "fallback_language",
            reason: e.to_string(),
        })
    }

    #[must_use]
    pub fn onboarding_confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.onboarding_confirmation_delay_ms)
    }

    #[must_use]
    pub fn document_load_timeout(&self) -> Duration {
        Duration::from_millis(self.document_load_timeout_ms)
    }
}
