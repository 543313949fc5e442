//! Process-wide context, built once at startup and owned by the [`App`].
//!
//! Teardown is dropping the `App`, which releases the identity and OS-theme
//! subscriptions held against these collaborators.
//!
//! [`App`]: crate::App

use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::capabilities::{
    IdentityService, LocalStore, ManualOsTheme, MemoryLocalStore, OsThemeSource, RemoteStore,
    Translator,
};
use crate::config::{AppConfig, ConfigError};
use crate::model::{LanguageCode, Theme, UserId};

/// Document store plus the identity service that scopes it.
#[derive(Clone)]
pub struct RemoteBackend {
    pub store: Arc<dyn RemoteStore>,
    pub identity: Arc<dyn IdentityService>,
}

impl RemoteBackend {
    pub fn new(store: Arc<dyn RemoteStore>, identity: Arc<dyn IdentityService>) -> Self {
        Self { store, identity }
    }
}

/// Where remote writes for the current identity go.
#[derive(Clone)]
pub struct RemoteTarget {
    pub store: Arc<dyn RemoteStore>,
    pub user: UserId,
}

impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTarget").field("user", &self.user).finish()
    }
}

pub struct Context {
    config: AppConfig,
    fallback_language: LanguageCode,
    bootstrap_token: Option<SecretString>,
    local: Arc<dyn LocalStore>,
    remote: Option<RemoteBackend>,
    os_theme: Arc<dyn OsThemeSource>,
    translator: Option<Arc<dyn Translator>>,
}

impl Context {
    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn fallback_language(&self) -> &LanguageCode {
        &self.fallback_language
    }

    #[must_use]
    pub fn local(&self) -> &dyn LocalStore {
        self.local.as_ref()
    }

    #[must_use]
    pub fn remote(&self) -> Option<&RemoteBackend> {
        self.remote.as_ref()
    }

    #[must_use]
    pub fn os_theme(&self) -> &Arc<dyn OsThemeSource> {
        &self.os_theme
    }

    #[must_use]
    pub fn translator(&self) -> Option<Arc<dyn Translator>> {
        self.translator.clone()
    }

    /// The token can be taken once per process.
    pub fn take_bootstrap_token(&mut self) -> Option<SecretString> {
        self.bootstrap_token.take()
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    config: Option<AppConfig>,
    local: Option<Arc<dyn LocalStore>>,
    remote: Option<RemoteBackend>,
    os_theme: Option<Arc<dyn OsThemeSource>>,
    translator: Option<Arc<dyn Translator>>,
}

impl ContextBuilder {
    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn local_store(mut self, local: Arc<dyn LocalStore>) -> Self {
        self.local = Some(local);
        self
    }

    #[must_use]
    pub fn remote(mut self, backend: RemoteBackend) -> Self {
        self.remote = Some(backend);
        self
    }

    #[must_use]
    pub fn os_theme(mut self, source: Arc<dyn OsThemeSource>) -> Self {
        self.os_theme = Some(source);
        self
    }

    #[must_use]
    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn build(self) -> Result<Context, ConfigError> {
        let mut config = self.config.unwrap_or_default();
        config.validate()?;
        let fallback_language = config.fallback_language()?;
        let bootstrap_token = config.bootstrap_token.take();

        let remote = match (self.remote, config.remote.is_some()) {
            (Some(backend), true) => Some(backend),
            (Some(_), false) => {
                warn!("remote backend supplied without connection config, running disconnected");
                None
            }
            (None, _) => None,
        };
        info!(
            connected = remote.is_some(),
            translator = self.translator.is_some(),
            "context built"
        );

        Ok(Context {
            config,
            fallback_language,
            bootstrap_token,
            local: self
                .local
                .unwrap_or_else(|| Arc::new(MemoryLocalStore::new())),
            remote,
            os_theme: self
                .os_theme
                .unwrap_or_else(|| Arc::new(ManualOsTheme::new(Theme::Light))),
            translator: self.translator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{MemoryIdentityService, MemoryRemoteStore};
    use crate::config::RemoteConfig;

    fn backend() -> RemoteBackend {
        RemoteBackend::new(
            Arc::new(MemoryRemoteStore::new()),
            Arc::new(MemoryIdentityService::new()),
        )
    }

    #[test]
    fn backend_without_connection_config_is_dropped() {
        let context = Context::builder().remote(backend()).build().unwrap();
        assert!(context.remote().is_none());
    }

    #[test]
    fn backend_with_connection_config_is_kept() {
        let remote = RemoteConfig::from_json(r#"{"projectId":"p","apiKey":"k"}"#).unwrap();
        let context = Context::builder()
            .config(AppConfig::default().with_remote(remote))
            .remote(backend())
            .build()
            .unwrap();
        assert!(context.remote().is_some());
    }

    #[test]
    fn bootstrap_token_is_taken_once() {
        let mut context = Context::builder()
            .config(AppConfig::default().with_bootstrap_token("one-time"))
            .build()
            .unwrap();
        assert!(context.take_bootstrap_token().is_some());
        assert!(context.take_bootstrap_token().is_none());
    }

    #[test]
    fn invalid_config_fails_the_build() {
        let config = AppConfig {
            fallback_language: "???".into(),
            ..AppConfig::default()
        };
        assert!(Context::builder().config(config).build().is_err());
    }
}
