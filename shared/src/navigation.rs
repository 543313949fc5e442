//! Single-slot navigation. Each route carries its own payload, so a screen
//! and its data are always committed together.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::model::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    LanguageSelect,
    Onboarding,
    Home,
    ExtraMode,
    SimpleMode,
    AiTranslator,
    NotesList,
    ContentViewer,
    PdfSelect,
    PdfViewer,
    ThemeSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Rasagran,
    LessonQna,
    Kavita,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub kind: ContentKind,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfKind {
    Digest,
    Note,
}

/// Per-screen data, for callers that build a route from a screen id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Subject { subject: String },
    Content { subject: String, content: Content },
    PdfKind { kind: PdfKind },
    Pdf { id: DocumentId, kind: PdfKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("{0:?} requires a payload")]
    MissingPayload(Screen),
    #[error("{0:?} takes no payload")]
    UnexpectedPayload(Screen),
    #[error("payload does not fit {0:?}")]
    MismatchedPayload(Screen),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Route {
    LanguageSelect,
    Onboarding,
    Home,
    ExtraMode,
    SimpleMode,
    AiTranslator,
    NotesList { subject: String },
    ContentViewer { subject: String, content: Content },
    PdfSelect { kind: PdfKind },
    PdfViewer { id: DocumentId, kind: PdfKind },
    ThemeSettings,
}

/// Flat `(screen, payload)` view of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub screen: Screen,
    pub payload: Option<Payload>,
}

impl Route {
    pub fn new(screen: Screen, payload: Option<Payload>) -> Result<Self, NavigationError> {
        let route = match (screen, payload) {
            (Screen::LanguageSelect, None) => Route::LanguageSelect,
            (Screen::Onboarding, None) => Route::Onboarding,
            (Screen::Home, None) => Route::Home,
            (Screen::ExtraMode, None) => Route::ExtraMode,
            (Screen::SimpleMode, None) => Route::SimpleMode,
            (Screen::AiTranslator, None) => Route::AiTranslator,
            (Screen::ThemeSettings, None) => Route::ThemeSettings,
            (Screen::NotesList, Some(Payload::Subject { subject })) => Route::NotesList { subject },
            (Screen::ContentViewer, Some(Payload::Content { subject, content })) => {
                Route::ContentViewer { subject, content }
            }
            (Screen::PdfSelect, Some(Payload::PdfKind { kind })) => Route::PdfSelect { kind },
            (Screen::PdfViewer, Some(Payload::Pdf { id, kind })) => Route::PdfViewer { id, kind },
            (
                Screen::NotesList | Screen::ContentViewer | Screen::PdfSelect | Screen::PdfViewer,
                None,
            ) => return Err(NavigationError::MissingPayload(screen)),
            (
                Screen::LanguageSelect
                | Screen::Onboarding
                | Screen::Home
                | Screen::ExtraMode
                | Screen::SimpleMode
                | Screen::AiTranslator
                | Screen::ThemeSettings,
                Some(_),
            ) => return Err(NavigationError::UnexpectedPayload(screen)),
            (_, Some(_)) => return Err(NavigationError::MismatchedPayload(screen)),
        };
        Ok(route)
    }

    /// Startup precedence: language first, then profile, then home.
    #[must_use]
    pub fn initial(has_language: bool, has_profile: bool) -> Self {
        match (has_language, has_profile) {
            (false, _) => Route::LanguageSelect,
            (true, false) => Route::Onboarding,
            (true, true) => Route::Home,
        }
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        match self {
            Route::LanguageSelect => Screen::LanguageSelect,
            Route::Onboarding => Screen::Onboarding,
            Route::Home => Screen::Home,
            Route::ExtraMode => Screen::ExtraMode,
            Route::SimpleMode => Screen::SimpleMode,
            Route::AiTranslator => Screen::AiTranslator,
            Route::NotesList { .. } => Screen::NotesList,
            Route::ContentViewer { .. } => Screen::ContentViewer,
            Route::PdfSelect { .. } => Screen::PdfSelect,
            Route::PdfViewer { .. } => Screen::PdfViewer,
            Route::ThemeSettings => Screen::ThemeSettings,
        }
    }

    #[must_use]
    pub fn payload(&self) -> Option<Payload> {
        match self {
            Route::NotesList { subject } => Some(Payload::Subject {
                subject: subject.clone(),
            }),
            Route::ContentViewer { subject, content } => Some(Payload::Content {
                subject: subject.clone(),
                content: content.clone(),
            }),
            Route::PdfSelect { kind } => Some(Payload::PdfKind { kind: *kind }),
            Route::PdfViewer { id, kind } => Some(Payload::Pdf {
                id: id.clone(),
                kind: *kind,
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn state(&self) -> NavigationState {
        NavigationState {
            screen: self.screen(),
            payload: self.payload(),
        }
    }

    /// Fixed back target, rebuilt from this route's own data.
    #[must_use]
    pub fn back(&self) -> Option<Route> {
        match self {
            Route::ExtraMode | Route::SimpleMode | Route::AiTranslator | Route::ThemeSettings => {
                Some(Route::Home)
            }
            Route::NotesList { .. } => Some(Route::ExtraMode),
            Route::ContentViewer { subject, .. } => Some(Route::NotesList {
                subject: subject.clone(),
            }),
            Route::PdfSelect { .. } => Some(Route::SimpleMode),
            Route::PdfViewer { kind, .. } => Some(Route::PdfSelect { kind: *kind }),
            Route::Home | Route::LanguageSelect | Route::Onboarding => None,
        }
    }
}

/// Owns the live route. Observers get whole-route snapshots.
#[derive(Debug)]
pub struct NavigationController {
    route: watch::Sender<Route>,
}

impl NavigationController {
    #[must_use]
    pub fn new(initial: Route) -> Self {
        info!(screen = ?initial.screen(), "initial route");
        let (route, _) = watch::channel(initial);
        Self { route }
    }

    #[must_use]
    pub fn current(&self) -> Route {
        self.route.borrow().clone()
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        self.route.borrow().screen()
    }

    pub fn goto(&self, route: Route) {
        debug!(screen = ?route.screen(), "navigate");
        self.route.send_replace(route);
    }

    pub fn goto_screen(
        &self,
        screen: Screen,
        payload: Option<Payload>,
    ) -> Result<(), NavigationError> {
        self.goto(Route::new(screen, payload)?);
        Ok(())
    }

    /// Returns false on screens without a back target.
    pub fn back(&self) -> bool {
        let target = self.route.borrow().back();
        match target {
            Some(route) => {
                self.goto(route);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.route.subscribe()
    }
}
