use serde::{Deserialize, Serialize};

use crate::app::Overlay;
use crate::capabilities::{IdentityError, IdentityNotice, RemoteError, TranslationError};
use crate::model::{DocumentId, LanguageCode, PreferencesPatch, ProfilePatch, Theme, UserId};
use crate::navigation::Route;
use crate::profile::{FormField, FormInput};
use crate::translation::TranslationRequest;

/// Both remote documents for one identity, fetched together.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RemoteSnapshot {
    pub user: UserId,
    pub preferences: Result<Option<PreferencesPatch>, RemoteError>,
    pub profile: Result<Option<ProfilePatch>, RemoteError>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TranslationOutcome {
    pub request: TranslationRequest,
    pub result: Result<String, TranslationError>,
}

// --- Event enum: no None variant, large variants boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Language & Onboarding
    LanguageConfirmed {
        language: LanguageCode,
    },
    OnboardingInput(FormInput),
    OnboardingNext,
    OnboardingBack,
    OnboardingSubmit,
    GetStarted,

    // Navigation
    Navigate(Box<Route>),
    NavigateBack,
    SimpleModeRequested,
    DisclaimerConfirmed,
    ThemeSettingsRequested,

    // Theme
    ToggleTheme,
    ToggleSystemTheme,

    // Overlays & Notices
    OverlayOpened(Overlay),
    OverlayClosed,
    ProfileEditRequested,
    NoticeDismissed,
    FeedbackRequested {
        text: String,
    },

    // Translator
    TranslatorInputChanged {
        text: String,
    },
    TranslatorSourceSelected {
        language: LanguageCode,
    },
    TranslatorTargetSelected {
        language: LanguageCode,
    },
    TranslateRequested,
    TranslatorSwapRequested,
    TranslatorCleared,
    HistoryRestored {
        index: usize,
    },
    HistoryCleared,

    // Document Viewer
    DocumentLoaded,
    DocumentZoomIn,
    DocumentZoomOut,

    // Shell Signals
    NetworkStatusChanged {
        online: bool,
    },
    OsThemeChanged(Theme),

    // Async Results (boxed to keep enum size small)
    IdentityChanged(IdentityNotice),
    SignInFailed(IdentityError),
    RemoteSnapshotFetched(Box<RemoteSnapshot>),
    TranslationFinished(Box<TranslationOutcome>),
    FeedbackStored(Box<Result<DocumentId, RemoteError>>),
    OnboardingDelayElapsed,
    DocumentLoadTimedOut {
        generation: u64,
    },
    AttentionElapsed(FormField),
}

impl Event {
    /// Name for logs. Never includes payload data.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Event::LanguageConfirmed { .. } => "language_confirmed",
            Event::OnboardingInput(_) => "onboarding_input",
            Event::OnboardingNext => "onboarding_next",
            Event::OnboardingBack => "onboarding_back",
            Event::OnboardingSubmit => "onboarding_submit",
            Event::GetStarted => "get_started",
            Event::Navigate(_) => "navigate",
            Event::NavigateBack => "navigate_back",
            Event::SimpleModeRequested => "simple_mode_requested",
            Event::DisclaimerConfirmed => "disclaimer_confirmed",
            Event::ThemeSettingsRequested => "theme_settings_requested",
            Event::ToggleTheme => "toggle_theme",
            Event::ToggleSystemTheme => "toggle_system_theme",
            Event::OverlayOpened(_) => "overlay_opened",
            Event::OverlayClosed => "overlay_closed",
            Event::ProfileEditRequested => "profile_edit_requested",
            Event::NoticeDismissed => "notice_dismissed",
            Event::FeedbackRequested { .. } => "feedback_requested",
            Event::TranslatorInputChanged { .. } => "translator_input_changed",
            Event::TranslatorSourceSelected { .. } => "translator_source_selected",
            Event::TranslatorTargetSelected { .. } => "translator_target_selected",
            Event::TranslateRequested => "translate_requested",
            Event::TranslatorSwapRequested => "translator_swap_requested",
            Event::TranslatorCleared => "translator_cleared",
            Event::HistoryRestored { .. } => "history_restored",
            Event::HistoryCleared => "history_cleared",
            Event::DocumentLoaded => "document_loaded",
            Event::DocumentZoomIn => "document_zoom_in",
            Event::DocumentZoomOut => "document_zoom_out",
            Event::NetworkStatusChanged { .. } => "network_status_changed",
            Event::OsThemeChanged(_) => "os_theme_changed",
            Event::IdentityChanged(_) => "identity_changed",
            Event::SignInFailed(_) => "sign_in_failed",
            Event::RemoteSnapshotFetched(_) => "remote_snapshot_fetched",
            Event::TranslationFinished(_) => "translation_finished",
            Event::FeedbackStored(_) => "feedback_stored",
            Event::OnboardingDelayElapsed => "onboarding_delay_elapsed",
            Event::DocumentLoadTimedOut { .. } => "document_load_timed_out",
            Event::AttentionElapsed(_) => "attention_elapsed",
        }
    }
}
