use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

use crate::capabilities::{DocumentPath, LocalStore, RemoteError, StorageKey, TypedSlot};
use crate::context::RemoteTarget;
use crate::model::{ProfilePatch, Standard, UserProfile, ValidationError};
use crate::task;
use crate::{AppError, PROFILE_EDIT_UNAVAILABLE};

const SLOT: TypedSlot<UserProfile> = TypedSlot::new(StorageKey::UserProfile);

pub const MIN_USERNAME_LETTERS: usize = 4;

pub fn validate_username(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let valid = trimmed.chars().count() >= MIN_USERNAME_LETTERS
        && trimmed.chars().all(|c| c.is_ascii_alphabetic() || c == ' ');
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidUsername)
    }
}

pub fn validate_school(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptySchool)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Local-first profile state. Written wholesale, once, at onboarding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSync {
    profile: Option<UserProfile>,
}

impl ProfileSync {
    /// A stored profile with a blank username counts as absent.
    pub fn load_initial(local: &dyn LocalStore) -> Self {
        let profile = SLOT
            .load(local)
            .filter(|p| !p.username.trim().is_empty());
        debug!(present = profile.is_some(), "profile loaded");
        Self { profile }
    }

    #[must_use]
    pub fn current(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.profile.is_some()
    }

    /// Local write first, then a best-effort full-document replace remotely.
    #[instrument(skip_all)]
    pub fn save(
        &mut self,
        local: &dyn LocalStore,
        profile: UserProfile,
        remote: Option<RemoteTarget>,
    ) {
        let _ = SLOT.save(local, &profile);
        self.profile = Some(profile.clone());

        let Some(target) = remote else {
            debug!("no remote identity, profile kept local");
            return;
        };
        task::spawn_detached("profile.set", async move {
            let path = DocumentPath::profile(&target.user);
            let document =
                serde_json::to_value(&profile).map_err(|e| RemoteError::invalid(&path, e))?;
            target.store.set(&path, document).await
        });
    }

    pub async fn fetch_remote(target: &RemoteTarget) -> Result<Option<ProfilePatch>, RemoteError> {
        let path = DocumentPath::profile(&target.user);
        match target.store.get(&path).await? {
            Some(doc) => serde_json::from_value(doc)
                .map(Some)
                .map_err(|e| RemoteError::invalid(&path, e)),
            None => Ok(None),
        }
    }

    pub fn apply_remote(
        &mut self,
        local: &dyn LocalStore,
        fetched: Result<Option<ProfilePatch>, RemoteError>,
    ) -> bool {
        let patch = match fetched {
            Ok(Some(patch)) => patch,
            Ok(None) => {
                debug!("no remote profile, keeping local value");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "remote profile fetch failed, keeping local value");
                return false;
            }
        };
        let Some(merged) = patch.overlay(self.profile.as_ref()) else {
            warn!("remote profile incomplete and nothing local to merge into");
            return false;
        };
        if merged.username.trim().is_empty() {
            warn!("remote profile has a blank username, ignoring");
            return false;
        }
        info!("applying remote profile");
        let _ = SLOT.save(local, &merged);
        self.profile = Some(merged);
        true
    }

    #[instrument(skip_all, fields(user = %target.user))]
    pub async fn reconcile_remote(
        &mut self,
        local: &dyn LocalStore,
        target: &RemoteTarget,
    ) -> bool {
        let fetched = Self::fetch_remote(target).await;
        self.apply_remote(local, fetched)
    }

    /// Editing is not implemented yet and says so.
    #[must_use]
    pub fn request_edit(&self) -> AppError {
        AppError::feature_unavailable(PROFILE_EDIT_UNAVAILABLE)
    }
}

// ============================================================================
// Onboarding form
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Username,
    School,
    Terms,
    Standard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    Details,
    Standard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormInput {
    Username(String),
    School(String),
    TermsAgreed(bool),
    Standard(Standard),
}

/// Two-step onboarding form. Field errors block progression and flag the
/// field for the attention animation until cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnboardingForm {
    username: String,
    school: String,
    standard: Option<Standard>,
    terms_agreed: bool,
    step: OnboardingStep,
    errors: BTreeMap<FormField, String>,
    attention: BTreeSet<FormField>,
}

impl OnboardingForm {
    pub fn input(&mut self, input: FormInput) {
        let field = match input {
            FormInput::Username(v) => {
                self.username = v;
                FormField::Username
            }
            FormInput::School(v) => {
                self.school = v;
                FormField::School
            }
            FormInput::TermsAgreed(v) => {
                self.terms_agreed = v;
                FormField::Terms
            }
            FormInput::Standard(v) => {
                self.standard = Some(v);
                FormField::Standard
            }
        };
        self.errors.remove(&field);
    }

    #[must_use]
    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    #[must_use]
    pub fn errors(&self) -> &BTreeMap<FormField, String> {
        &self.errors
    }

    #[must_use]
    pub fn attention(&self) -> &BTreeSet<FormField> {
        &self.attention
    }

    /// Validates step one. Returns the fields that failed.
    pub fn next(&mut self) -> Vec<FormField> {
        let failed = self.check(&[
            (FormField::Username, validate_username(&self.username).err()),
            (FormField::School, validate_school(&self.school).err()),
            (
                FormField::Terms,
                (!self.terms_agreed).then_some(ValidationError::TermsNotAccepted),
            ),
        ]);
        if failed.is_empty() {
            self.step = OnboardingStep::Standard;
        }
        failed
    }

    pub fn back(&mut self) {
        self.step = OnboardingStep::Details;
        self.errors.remove(&FormField::Standard);
    }

    /// Validates everything and produces the profile to save.
    pub fn submit(&mut self) -> Result<UserProfile, Vec<FormField>> {
        let username = validate_username(&self.username);
        let school = validate_school(&self.school);
        let standard = self.standard.ok_or(ValidationError::StandardMissing);
        let failed = self.check(&[
            (FormField::Username, username.clone().err()),
            (FormField::School, school.clone().err()),
            (
                FormField::Terms,
                (!self.terms_agreed).then_some(ValidationError::TermsNotAccepted),
            ),
            (FormField::Standard, standard.clone().err()),
        ]);
        match (username, school, standard) {
            (Ok(username), Ok(school), Ok(standard)) if failed.is_empty() => Ok(UserProfile {
                username,
                school,
                standard,
            }),
            _ => Err(failed),
        }
    }

    pub fn clear_attention(&mut self, field: FormField) {
        self.attention.remove(&field);
    }

    fn check(&mut self, results: &[(FormField, Option<ValidationError>)]) -> Vec<FormField> {
        let mut failed = Vec::new();
        for (field, error) in results {
            match error {
                Some(e) => {
                    self.errors.insert(*field, e.to_string());
                    self.attention.insert(*field);
                    failed.push(*field);
                }
                None => {
                    self.errors.remove(field);
                }
            }
        }
        failed
    }
}
