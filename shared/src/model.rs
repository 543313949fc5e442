use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::TRANSLATION_HISTORY_CAP;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(UserId);
typed_id!(DocumentId);

/// Explicit timestamp unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Username must be at least 4 letters (A-Z, a-z, space only).")]
    InvalidUsername,
    #[error("School name cannot be empty.")]
    EmptySchool,
    #[error("You must agree to the terms to continue.")]
    TermsNotAccepted,
    #[error("Please select your standard.")]
    StandardMissing,
    #[error("Please enter text to translate.")]
    EmptyTranslationInput,
    #[error("Feedback must be between {min} and {max} characters (got {len}).")]
    FeedbackLength { len: usize, min: usize, max: usize },
    #[error("invalid language code: {0:?}")]
    InvalidLanguageCode(String),
}

// --- Theme ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Light => "light",
            Self::Dark => "dark",
        })
    }
}

// --- Language code: validated on construction and on deserialization ---

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    const MAX_LENGTH: usize = 8;

    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into().trim().to_ascii_lowercase();
        let valid = !code.is_empty()
            && code.len() <= Self::MAX_LENGTH
            && code.chars().all(|c| c.is_ascii_lowercase() || c == '-');
        if valid {
            Ok(Self(code))
        } else {
            Err(ValidationError::InvalidLanguageCode(code))
        }
    }

    #[must_use]
    pub fn english() -> Self {
        Self("en".into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self {
        code.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Preferences ---

/// `theme` only counts when `use_system_theme` is false; the rendered theme
/// is derived by [`crate::theme::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub language: LanguageCode,
    pub theme: Theme,
    pub use_system_theme: bool,
}

impl UserPreferences {
    #[must_use]
    pub fn with_defaults(fallback_language: LanguageCode) -> Self {
        Self {
            language: fallback_language,
            theme: Theme::Light,
            use_system_theme: true,
        }
    }

    /// Overwrites exactly the fields the patch defines.
    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(language) = &patch.language {
            self.language = language.clone();
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(use_system_theme) = patch.use_system_theme {
            self.use_system_theme = use_system_theme;
        }
    }
}

/// Partial preferences. Same shape as the stored and remote documents, where
/// any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageCode>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub use_system_theme: Option<bool>,
}

/// A malformed field reads as missing so it cannot take its siblings down
/// with it.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(err) => {
            warn!(error = %err, "dropping malformed preference field");
            Ok(None)
        }
    }
}

impl PreferencesPatch {
    #[must_use]
    pub fn language(language: LanguageCode) -> Self {
        Self {
            language: Some(language),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn theme(theme: Theme) -> Self {
        Self {
            theme: Some(theme),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn use_system_theme(enabled: bool) -> Self {
        Self {
            use_system_theme: Some(enabled),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn and_theme(mut self, theme: Theme) -> Self {
        self.theme = Some(theme);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.theme.is_none() && self.use_system_theme.is_none()
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(3);
        if self.language.is_some() {
            names.push("language");
        }
        if self.theme.is_some() {
            names.push("theme");
        }
        if self.use_system_theme.is_some() {
            names.push("useSystemTheme");
        }
        names
    }
}

impl From<&UserPreferences> for PreferencesPatch {
    fn from(prefs: &UserPreferences) -> Self {
        Self {
            language: Some(prefs.language.clone()),
            theme: Some(prefs.theme),
            use_system_theme: Some(prefs.use_system_theme),
        }
    }
}

// --- Profile ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Standard {
    #[serde(rename = "10th")]
    Tenth,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub school: String,
    pub standard: Standard,
}

// Redact debug output because this contains user-provided personal data.
impl fmt::Debug for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserProfile")
            .field("username_len", &self.username.chars().count())
            .field("school_present", &!self.school.is_empty())
            .field("standard", &self.standard)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub standard: Option<Standard>,
}

impl ProfilePatch {
    /// Overlays the defined fields onto `base`. Without a base every field must
    /// be present, otherwise there is no profile to build.
    #[must_use]
    pub fn overlay(self, base: Option<&UserProfile>) -> Option<UserProfile> {
        match base {
            Some(base) => Some(UserProfile {
                username: self.username.unwrap_or_else(|| base.username.clone()),
                school: self.school.unwrap_or_else(|| base.school.clone()),
                standard: self.standard.unwrap_or(base.standard),
            }),
            None => Some(UserProfile {
                username: self.username?,
                school: self.school?,
                standard: self.standard?,
            }),
        }
    }
}

// --- Translation history ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationHistoryItem {
    pub input: String,
    pub output: String,
    #[serde(rename = "source")]
    pub source_lang_code: LanguageCode,
    #[serde(rename = "target")]
    pub target_lang_code: LanguageCode,
}

/// Most-recent-first, bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationHistory {
    items: VecDeque<TranslationHistoryItem>,
    #[serde(skip)]
    cap: usize,
}

impl Default for TranslationHistory {
    fn default() -> Self {
        Self::with_cap(TRANSLATION_HISTORY_CAP)
    }
}

impl TranslationHistory {
    #[must_use]
    pub fn with_cap(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    #[must_use]
    pub fn from_items(items: Vec<TranslationHistoryItem>, cap: usize) -> Self {
        let mut history = Self::with_cap(cap);
        history.items.extend(items.into_iter().take(history.cap));
        history
    }

    pub fn push(&mut self, item: TranslationHistoryItem) {
        self.items.push_front(item);
        self.items.truncate(self.cap);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TranslationHistoryItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranslationHistoryItem> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<TranslationHistoryItem> {
        self.items.iter().cloned().collect()
    }
}
