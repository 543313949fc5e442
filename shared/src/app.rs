//! The core: a single-writer event loop over the sync components.
//!
//! `update` is the only place state changes. Background tasks report back
//! through the event channel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, instrument, warn};

use crate::bootstrap::{BootstrapStep, IdentityBootstrap, IdentityHandle};
use crate::capabilities::{
    IdentityError, IdentityNotice, StorageKey, Subscription, TranslationError, TypedSlot,
};
use crate::context::{Context, RemoteTarget};
use crate::document::DocumentViewer;
use crate::event::{Event, RemoteSnapshot, TranslationOutcome};
use crate::feedback::{self, FeedbackEntry};
use crate::model::{LanguageCode, PreferencesPatch, Theme};
use crate::navigation::{NavigationController, Route};
use crate::preferences::PreferenceSync;
use crate::profile::{FormField, OnboardingForm, OnboardingStep, ProfileSync};
use crate::task;
use crate::theme::ThemeResolver;
use crate::translation::TranslatorPanel;
use crate::{AppError, ATTENTION_ANIMATION};

const APP_OPENS: TypedSlot<u64> = TypedSlot::new(StorageKey::AppOpens);
const DISCLAIMER_ACCEPTED: TypedSlot<bool> =
    TypedSlot::new(StorageKey::SimpleModeDisclaimerAccepted);

/// Quiet rounds after which [`App::settle`] considers background work done.
const SETTLE_QUIET_ROUNDS: usize = 8;

/// Modal surfaces. At most one is open.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Overlay {
    Menu,
    Profile,
    Feedback,
    About,
    Disclaimer,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingPhase {
    #[default]
    Editing,
    /// Profile saved; confirmation spinner showing.
    Confirming,
    Complete,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    #[default]
    Idle,
    Sending,
    Sent,
}

/// UI-only state that is not owned by one of the sync components.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub app_opens: u64,
    pub disclaimer_accepted: bool,
    pub network_online: bool,
    pub is_loading: bool,
    pub overlay: Option<Overlay>,
    pub notice: Option<AppError>,
    pub onboarding: OnboardingForm,
    pub onboarding_phase: OnboardingPhase,
    pub feedback: FeedbackStatus,
    pub feedback_error: Option<String>,
    pub translator: TranslatorPanel,
    pub document: DocumentViewer,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub route: Route,
    pub theme: Theme,
    pub use_system_theme: bool,
    pub language: LanguageCode,
    pub username: Option<String>,
    pub app_opens: u64,
    /// `None` until the identity bootstrap resolves.
    pub identity_label: Option<String>,
    pub is_loading: bool,
    pub overlay: Option<Overlay>,
    pub notice: Option<String>,
    pub network_online: bool,
    pub onboarding_step: OnboardingStep,
    pub onboarding_phase: OnboardingPhase,
    pub onboarding_errors: BTreeMap<FormField, String>,
    pub onboarding_attention: Vec<FormField>,
    pub feedback: FeedbackStatus,
    pub feedback_error: Option<String>,
    pub translator: TranslatorPanel,
    pub document: DocumentViewer,
}

pub struct App {
    context: Context,
    preferences: PreferenceSync,
    profile: ProfileSync,
    theme: ThemeResolver,
    navigation: NavigationController,
    bootstrap: IdentityBootstrap,
    identity_subscription: Option<Subscription>,
    model: Model,
    events_tx: UnboundedSender<Event>,
    events_rx: UnboundedReceiver<Event>,
}

impl App {
    /// Reads everything the first render needs from the local store,
    /// synchronously. No network activity happens here.
    pub fn new(mut context: Context) -> Self {
        let token = context.take_bootstrap_token();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let local = context.local();
        let app_opens = APP_OPENS.load(local).unwrap_or(0).saturating_add(1);
        let _ = APP_OPENS.save(local, &app_opens);
        let disclaimer_accepted = DISCLAIMER_ACCEPTED.load(local).unwrap_or(false);

        let preferences = PreferenceSync::load_initial(local, context.fallback_language());
        let profile = ProfileSync::load_initial(local);
        let translator = TranslatorPanel::load(local, context.config().translation_history_cap);

        let os_tx = events_tx.clone();
        let theme = ThemeResolver::new(
            Arc::clone(context.os_theme()),
            preferences.current(),
            Arc::new(move |theme| {
                let _ = os_tx.send(Event::OsThemeChanged(theme));
            }),
        );

        let initial = Route::initial(preferences.language_confirmed(), profile.is_present());
        info!(app_opens, screen = ?initial.screen(), "app started");

        Self {
            navigation: NavigationController::new(initial),
            bootstrap: IdentityBootstrap::new(token),
            identity_subscription: None,
            model: Model {
                app_opens,
                disclaimer_accepted,
                network_online: true,
                is_loading: false,
                overlay: None,
                notice: None,
                onboarding: OnboardingForm::default(),
                onboarding_phase: OnboardingPhase::default(),
                feedback: FeedbackStatus::default(),
                feedback_error: None,
                translator,
                document: DocumentViewer::default(),
            },
            context,
            preferences,
            profile,
            theme,
            events_tx,
            events_rx,
        }
    }

    /// Begins the identity bootstrap. Without a remote backend this resolves
    /// to `Disconnected` before returning.
    pub fn start(&mut self) {
        let Some(backend) = self.context.remote() else {
            self.bootstrap.start(false);
            return;
        };
        if !self.bootstrap.start(true) {
            return;
        }
        let tx = self.events_tx.clone();
        let subscription = backend.identity.subscribe(Arc::new(move |notice| {
            let _ = tx.send(Event::IdentityChanged(notice));
        }));
        self.identity_subscription = Some(subscription);
    }

    #[must_use]
    pub fn view(&self) -> ViewModel {
        let prefs = self.preferences.current();
        ViewModel {
            route: self.navigation.current(),
            theme: self.theme.effective(),
            use_system_theme: prefs.use_system_theme,
            language: prefs.language.clone(),
            username: self.profile.current().map(|p| p.username.clone()),
            app_opens: self.model.app_opens,
            identity_label: self.bootstrap.handle().map(|h| h.label().to_string()),
            is_loading: self.model.is_loading,
            overlay: self.model.overlay,
            notice: self.model.notice.as_ref().map(AppError::user_facing_message),
            network_online: self.model.network_online,
            onboarding_step: self.model.onboarding.step(),
            onboarding_phase: self.model.onboarding_phase,
            onboarding_errors: self.model.onboarding.errors().clone(),
            onboarding_attention: self.model.onboarding.attention().iter().copied().collect(),
            feedback: self.model.feedback,
            feedback_error: self.model.feedback_error.clone(),
            translator: self.model.translator.clone(),
            document: self.model.document.clone(),
        }
    }

    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[must_use]
    pub fn preferences(&self) -> &PreferenceSync {
        &self.preferences
    }

    #[must_use]
    pub fn profile(&self) -> &ProfileSync {
        &self.profile
    }

    #[must_use]
    pub fn theme(&self) -> &ThemeResolver {
        &self.theme
    }

    #[must_use]
    pub fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    #[must_use]
    pub fn identity(&self) -> Option<&IdentityHandle> {
        self.bootstrap.handle()
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Sender for shells that deliver events from other threads.
    #[must_use]
    pub fn event_sender(&self) -> UnboundedSender<Event> {
        self.events_tx.clone()
    }

    /// Waits for the next background result and applies it.
    pub async fn process_next(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.update(event);
                true
            }
            None => false,
        }
    }

    /// Applies every queued background result without waiting.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.update(event);
            applied += 1;
        }
        applied
    }

    /// Lets spawned tasks run and applies their results until the queue
    /// stays empty. Tasks blocked on timers or I/O are left pending.
    pub async fn settle(&mut self) {
        let mut quiet = 0;
        while quiet < SETTLE_QUIET_ROUNDS {
            tokio::task::yield_now().await;
            if self.drain_pending() == 0 {
                quiet += 1;
            } else {
                quiet = 0;
            }
        }
    }

    /// Remote writes go here only once an identity is established.
    fn remote_target(&self) -> Option<RemoteTarget> {
        let user = self.bootstrap.handle()?.user_id()?.clone();
        let backend = self.context.remote()?;
        Some(RemoteTarget {
            store: Arc::clone(&backend.store),
            user,
        })
    }

    #[instrument(skip_all, fields(event = event.name()))]
    pub fn update(&mut self, event: Event) {
        match event {
            // --- Language & onboarding ---
            Event::LanguageConfirmed { language } => {
                let remote = self.remote_target();
                self.preferences
                    .save(self.context.local(), PreferencesPatch::language(language), remote);
                let next = if self.profile.is_present() {
                    Route::Home
                } else {
                    Route::Onboarding
                };
                self.navigate(next);
            }
            Event::OnboardingInput(input) => self.model.onboarding.input(input),
            Event::OnboardingNext => {
                let failed = self.model.onboarding.next();
                self.flag_attention(&failed);
            }
            Event::OnboardingBack => self.model.onboarding.back(),
            Event::OnboardingSubmit => self.submit_onboarding(),
            Event::OnboardingDelayElapsed => {
                self.model.is_loading = false;
                if self.model.onboarding_phase == OnboardingPhase::Confirming {
                    self.model.onboarding_phase = OnboardingPhase::Complete;
                }
            }
            Event::GetStarted => {
                let complete = self.model.onboarding_phase == OnboardingPhase::Complete;
                if complete && self.profile.is_present() {
                    self.model.onboarding = OnboardingForm::default();
                    self.model.onboarding_phase = OnboardingPhase::Editing;
                    self.navigate(Route::Home);
                } else {
                    debug!("get started before onboarding completed");
                }
            }
            Event::AttentionElapsed(field) => self.model.onboarding.clear_attention(field),

            // --- Navigation ---
            Event::Navigate(route) => self.navigate(*route),
            Event::NavigateBack => {
                if let Some(target) = self.navigation.current().back() {
                    self.navigate(target);
                }
            }
            Event::SimpleModeRequested => self.navigate(Route::SimpleMode),
            Event::DisclaimerConfirmed => {
                let _ = DISCLAIMER_ACCEPTED.save(self.context.local(), &true);
                self.model.disclaimer_accepted = true;
                self.model.overlay = None;
                self.navigate(Route::SimpleMode);
            }
            Event::ThemeSettingsRequested => {
                self.model.overlay = None;
                self.navigate(Route::ThemeSettings);
            }

            // --- Theme ---
            Event::ToggleTheme => {
                let patch = self.theme.toggle_theme();
                self.save_preferences(patch);
            }
            Event::ToggleSystemTheme => {
                let patch = self.theme.toggle_system_theme();
                self.save_preferences(patch);
            }
            Event::OsThemeChanged(theme) => self.theme.on_os_theme_changed(theme),

            // --- Overlays & notices ---
            Event::OverlayOpened(overlay) => {
                self.model.feedback_error = None;
                if overlay == Overlay::Feedback {
                    self.model.feedback = FeedbackStatus::Idle;
                }
                self.model.overlay = Some(overlay);
            }
            Event::OverlayClosed => {
                self.model.overlay = None;
                self.model.feedback_error = None;
            }
            Event::ProfileEditRequested => {
                self.model.notice = Some(self.profile.request_edit());
            }
            Event::NoticeDismissed => self.model.notice = None,
            Event::FeedbackRequested { text } => self.send_feedback(&text),
            Event::FeedbackStored(result) => match *result {
                Ok(_) => {
                    self.model.feedback = FeedbackStatus::Sent;
                    self.model.overlay = None;
                }
                Err(e) => {
                    warn!(error = %e, "feedback submission failed");
                    self.model.feedback = FeedbackStatus::Idle;
                    self.model.feedback_error = Some(AppError::from(e).user_facing_message());
                }
            },

            // --- Translator ---
            Event::TranslatorInputChanged { text } => self.model.translator.set_input(text),
            Event::TranslatorSourceSelected { language } => {
                self.model.translator.set_source(language);
            }
            Event::TranslatorTargetSelected { language } => {
                if !self.model.translator.set_target(language) {
                    debug!("auto-detect rejected as target language");
                }
            }
            Event::TranslateRequested => self.request_translation(),
            Event::TranslationFinished(outcome) => {
                let TranslationOutcome { request, result } = *outcome;
                self.model.translator.finish(self.context.local(), request, result);
            }
            Event::TranslatorSwapRequested => {
                self.model.translator.swap();
            }
            Event::TranslatorCleared => self.model.translator.clear(),
            Event::HistoryRestored { index } => {
                self.model.translator.restore(index);
            }
            Event::HistoryCleared => self.model.translator.clear_history(self.context.local()),

            // --- Document viewer ---
            Event::DocumentLoaded => self.model.document.loaded(),
            Event::DocumentZoomIn => self.model.document.zoom_in(),
            Event::DocumentZoomOut => self.model.document.zoom_out(),
            Event::DocumentLoadTimedOut { generation } => self.model.document.timed_out(generation),

            // --- Shell signals ---
            Event::NetworkStatusChanged { online } => {
                info!(online, "network status changed");
                self.model.network_online = online;
            }

            // --- Identity & reconciliation ---
            Event::IdentityChanged(notice) => {
                let step = self.bootstrap.on_notice(notice);
                self.perform(step);
            }
            Event::SignInFailed(error) => self.bootstrap.on_sign_in_failed(&error),
            Event::RemoteSnapshotFetched(snapshot) => self.apply_snapshot(*snapshot),
        }
    }

    /// Commits the route, applying the simple-mode gate and arming the
    /// document viewer. Opening a new screen closes any overlay.
    fn navigate(&mut self, route: Route) {
        if route == Route::SimpleMode && !self.model.disclaimer_accepted {
            debug!("simple mode gated behind disclaimer");
            self.model.overlay = Some(Overlay::Disclaimer);
            return;
        }
        if matches!(route, Route::PdfViewer { .. }) {
            let generation = self.model.document.open();
            let delay = self.context.config().document_load_timeout();
            task::spawn_timer(
                &self.events_tx,
                "document.timeout",
                delay,
                Event::DocumentLoadTimedOut { generation },
            );
        }
        self.model.overlay = None;
        self.navigation.goto(route);
    }

    fn save_preferences(&mut self, patch: PreferencesPatch) {
        let remote = self.remote_target();
        self.preferences.save(self.context.local(), patch, remote);
    }

    fn flag_attention(&self, fields: &[FormField]) {
        for field in fields {
            task::spawn_timer(
                &self.events_tx,
                "onboarding.attention",
                ATTENTION_ANIMATION,
                Event::AttentionElapsed(*field),
            );
        }
    }

    fn submit_onboarding(&mut self) {
        let profile = match self.model.onboarding.submit() {
            Ok(profile) => profile,
            Err(failed) => {
                self.flag_attention(&failed);
                return;
            }
        };
        let remote = self.remote_target();
        self.profile.save(self.context.local(), profile, remote);
        self.model.is_loading = true;
        self.model.onboarding_phase = OnboardingPhase::Confirming;

        let delay = self.context.config().onboarding_confirmation_delay();
        let elapsed = Event::OnboardingDelayElapsed;
        if !task::spawn_timer(&self.events_tx, "onboarding.confirm", delay, elapsed) {
            self.update(Event::OnboardingDelayElapsed);
        }
    }

    fn send_feedback(&mut self, text: &str) {
        let text = match feedback::validate_feedback(text) {
            Ok(text) => text,
            Err(e) => {
                self.model.feedback_error = Some(AppError::from(e).user_facing_message());
                return;
            }
        };
        self.model.feedback_error = None;
        let Some(target) = self.remote_target() else {
            warn!("feedback not sent, no remote identity");
            return;
        };
        let entry = FeedbackEntry::new(
            target.user.clone(),
            self.profile.current().cloned(),
            text,
            self.context.config().app_version.clone(),
        );
        self.model.feedback = FeedbackStatus::Sending;
        let spawned = task::spawn_event(&self.events_tx, "feedback.add", async move {
            let result = feedback::submit_feedback(target.store.as_ref(), entry).await;
            Some(Event::FeedbackStored(Box::new(result)))
        });
        if !spawned {
            self.model.feedback = FeedbackStatus::Idle;
        }
    }

    fn request_translation(&mut self) {
        let Ok(request) = self.model.translator.begin() else {
            return;
        };
        let Some(translator) = self.context.translator() else {
            self.model
                .translator
                .finish(self.context.local(), request, Err(TranslationError::Unavailable));
            return;
        };
        let pending = request.clone();
        let spawned = task::spawn_event(&self.events_tx, "translator.translate", async move {
            let result = translator
                .translate(&pending.text, &pending.source, &pending.target)
                .await;
            Some(Event::TranslationFinished(Box::new(TranslationOutcome {
                request: pending,
                result,
            })))
        });
        if !spawned {
            self.model
                .translator
                .finish(self.context.local(), request, Err(TranslationError::Unavailable));
        }
    }

    fn perform(&mut self, step: BootstrapStep) {
        let Some(backend) = self.context.remote().cloned() else {
            return;
        };
        match step {
            BootstrapStep::None => {}
            BootstrapStep::RedeemToken(token) => {
                let identity = backend.identity;
                let spawned = task::spawn_event(&self.events_tx, "identity.redeem", async move {
                    Some(match identity.redeem_token(&token).await {
                        Ok(user) => Event::IdentityChanged(IdentityNotice::SignedIn(user)),
                        Err(e) => Event::SignInFailed(e),
                    })
                });
                if !spawned {
                    self.bootstrap.on_sign_in_failed(&no_runtime());
                }
            }
            BootstrapStep::SignInAnonymously => {
                let identity = backend.identity;
                let spawned = task::spawn_event(&self.events_tx, "identity.anonymous", async move {
                    Some(match identity.sign_in_anonymously().await {
                        Ok(user) => Event::IdentityChanged(IdentityNotice::SignedIn(user)),
                        Err(e) => Event::SignInFailed(e),
                    })
                });
                if !spawned {
                    self.bootstrap.on_sign_in_failed(&no_runtime());
                }
            }
            BootstrapStep::Reconcile(user) => {
                let target = RemoteTarget {
                    store: backend.store,
                    user,
                };
                task::spawn_event(&self.events_tx, "sync.reconcile", async move {
                    let (preferences, profile) = tokio::join!(
                        PreferenceSync::fetch_remote(&target),
                        ProfileSync::fetch_remote(&target),
                    );
                    Some(Event::RemoteSnapshotFetched(Box::new(RemoteSnapshot {
                        user: target.user,
                        preferences,
                        profile,
                    })))
                });
            }
        }
    }

    /// Patches in-memory state in place. Never navigates.
    fn apply_snapshot(&mut self, snapshot: RemoteSnapshot) {
        let current = self.bootstrap.handle().and_then(IdentityHandle::user_id);
        if current != Some(&snapshot.user) {
            debug!(user = %snapshot.user, "discarding snapshot for a previous identity");
            return;
        }
        let local = self.context.local();
        if self.preferences.apply_remote(local, snapshot.preferences) {
            self.theme.apply_preferences(self.preferences.current());
        }
        self.profile.apply_remote(local, snapshot.profile);
    }
}

fn no_runtime() -> IdentityError {
    IdentityError::Unavailable {
        reason: "no async runtime".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{LocalStore, MemoryLocalStore};
    use crate::navigation::Screen;

    fn app_with(store: MemoryLocalStore) -> App {
        let context = Context::builder()
            .local_store(Arc::new(store))
            .build()
            .unwrap();
        App::new(context)
    }

    #[test]
    fn app_opens_counts_each_start() {
        let store = Arc::new(MemoryLocalStore::new().with_raw(StorageKey::AppOpens, "41"));
        let context = Context::builder()
            .local_store(Arc::clone(&store) as Arc<dyn LocalStore>)
            .build()
            .unwrap();
        let app = App::new(context);
        assert_eq!(app.model().app_opens, 42);
        assert_eq!(store.raw(StorageKey::AppOpens).as_deref(), Some("42"));
    }

    #[test]
    fn corrupt_counter_restarts_from_zero() {
        let app = app_with(MemoryLocalStore::new().with_raw(StorageKey::AppOpens, "many"));
        assert_eq!(app.model().app_opens, 1);
    }

    #[test]
    fn simple_mode_is_gated_by_disclaimer() {
        let mut app = app_with(MemoryLocalStore::new());
        app.update(Event::SimpleModeRequested);
        assert_eq!(app.navigation().screen(), Screen::LanguageSelect);
        assert_eq!(app.model().overlay, Some(Overlay::Disclaimer));

        app.update(Event::DisclaimerConfirmed);
        assert_eq!(app.navigation().screen(), Screen::SimpleMode);
        assert!(app.model().disclaimer_accepted);

        app.update(Event::NavigateBack);
        app.update(Event::SimpleModeRequested);
        assert_eq!(app.navigation().screen(), Screen::SimpleMode);
        assert_eq!(app.model().overlay, None);
    }

    #[test]
    fn only_one_overlay_at_a_time() {
        let mut app = app_with(MemoryLocalStore::new());
        app.update(Event::OverlayOpened(Overlay::Menu));
        app.update(Event::OverlayOpened(Overlay::About));
        assert_eq!(app.model().overlay, Some(Overlay::About));

        app.update(Event::ThemeSettingsRequested);
        assert_eq!(app.model().overlay, None);
        assert_eq!(app.navigation().screen(), Screen::ThemeSettings);
    }

    #[test]
    fn profile_edit_shows_notice() {
        let mut app = app_with(MemoryLocalStore::new());
        app.update(Event::ProfileEditRequested);
        assert_eq!(
            app.view().notice.as_deref(),
            Some(crate::PROFILE_EDIT_UNAVAILABLE)
        );
        app.update(Event::NoticeDismissed);
        assert!(app.view().notice.is_none());
    }

    #[test]
    fn feedback_length_is_validated_inline() {
        let mut app = app_with(MemoryLocalStore::new());
        app.update(Event::OverlayOpened(Overlay::Feedback));
        app.update(Event::FeedbackRequested { text: "short".into() });
        assert!(app.model().feedback_error.is_some());
        assert_eq!(app.model().feedback, FeedbackStatus::Idle);
    }

    #[test]
    fn identity_label_absent_until_started() {
        let mut app = app_with(MemoryLocalStore::new());
        assert!(app.view().identity_label.is_none());
        app.start();
        assert_eq!(app.view().identity_label.as_deref(), Some("offline_user"));
    }

    #[test]
    fn network_indicator_follows_shell() {
        let mut app = app_with(MemoryLocalStore::new());
        app.update(Event::NetworkStatusChanged { online: false });
        assert!(!app.view().network_online);
    }
}
