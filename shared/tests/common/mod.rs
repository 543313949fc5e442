#![allow(dead_code)]

use std::sync::Arc;

use shared::capabilities::{
    LocalStore, ManualOsTheme, MemoryIdentityService, MemoryLocalStore, MemoryRemoteStore,
    OsThemeSource, Translator,
};
use shared::{App, AppConfig, Context, RemoteBackend, RemoteConfig, Theme};

pub struct Harness {
    pub app: App,
    pub local: Arc<MemoryLocalStore>,
    pub remote: Arc<MemoryRemoteStore>,
    pub identity: Arc<MemoryIdentityService>,
    pub os_theme: Arc<ManualOsTheme>,
}

pub struct HarnessBuilder {
    local: MemoryLocalStore,
    remote: MemoryRemoteStore,
    identity: MemoryIdentityService,
    os_theme: Theme,
    token: Option<String>,
    connected: bool,
    translator: Option<Arc<dyn Translator>>,
}

impl HarnessBuilder {
    pub fn local(mut self, local: MemoryLocalStore) -> Self {
        self.local = local;
        self
    }

    pub fn remote(mut self, remote: MemoryRemoteStore) -> Self {
        self.remote = remote;
        self
    }

    pub fn identity(mut self, identity: MemoryIdentityService) -> Self {
        self.identity = identity;
        self
    }

    pub fn os_theme(mut self, theme: Theme) -> Self {
        self.os_theme = theme;
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Builds the app without starting the identity bootstrap.
    pub fn build(self) -> Harness {
        let local = Arc::new(self.local);
        let remote = Arc::new(self.remote);
        let identity = Arc::new(self.identity);
        let os_theme = Arc::new(ManualOsTheme::new(self.os_theme));

        let mut config = AppConfig::default();
        if self.connected {
            config = config.with_remote(
                RemoteConfig::from_json(r#"{"projectId":"gyan-test","apiKey":"test-key"}"#)
                    .unwrap(),
            );
        }
        if let Some(token) = self.token {
            config = config.with_bootstrap_token(token);
        }

        let mut builder = Context::builder()
            .config(config)
            .local_store(Arc::clone(&local) as Arc<dyn LocalStore>)
            .os_theme(Arc::clone(&os_theme) as Arc<dyn OsThemeSource>)
            .remote(RemoteBackend::new(remote.clone(), identity.clone()));
        if let Some(translator) = self.translator {
            builder = builder.translator(translator);
        }

        Harness {
            app: App::new(builder.build().unwrap()),
            local,
            remote,
            identity,
            os_theme,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder {
        local: MemoryLocalStore::new(),
        remote: MemoryRemoteStore::new(),
        identity: MemoryIdentityService::new(),
        os_theme: Theme::Light,
        token: None,
        connected: true,
        translator: None,
    }
}

pub const STORED_PROFILE: &str =
    r#"{"username":"Asha Rao","school":"Sunrise Public School","standard":"10th"}"#;
