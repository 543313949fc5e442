use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::capabilities::{server_timestamp, RemoteError, RemoteStore, FEEDBACK_COLLECTION};
use crate::model::{DocumentId, UserId, UserProfile, ValidationError};

pub const MIN_FEEDBACK_CHARS: usize = 10;
pub const MAX_FEEDBACK_CHARS: usize = 1000;

/// Trims and checks the length bounds, counted in characters.
pub fn validate_feedback(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if (MIN_FEEDBACK_CHARS..=MAX_FEEDBACK_CHARS).contains(&len) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::FeedbackLength {
            len,
            min: MIN_FEEDBACK_CHARS,
            max: MAX_FEEDBACK_CHARS,
        })
    }
}

/// Append-only entry in the feedback collection.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub user_id: UserId,
    pub profile: Option<UserProfile>,
    pub feedback: String,
    pub timestamp: Value,
    pub app_version: String,
}

impl FeedbackEntry {
    #[must_use]
    pub fn new(
        user_id: UserId,
        profile: Option<UserProfile>,
        feedback: String,
        app_version: String,
    ) -> Self {
        Self {
            user_id,
            profile,
            feedback,
            timestamp: server_timestamp(),
            app_version,
        }
    }
}

#[instrument(skip_all, fields(user = %entry.user_id, len = entry.feedback.chars().count()))]
pub async fn submit_feedback(
    store: &dyn RemoteStore,
    entry: FeedbackEntry,
) -> Result<DocumentId, RemoteError> {
    let document = serde_json::to_value(&entry).map_err(|e| RemoteError::InvalidDocument {
        path: FEEDBACK_COLLECTION.to_string(),
        message: e.to_string(),
    })?;
    let id = store.add(FEEDBACK_COLLECTION, document).await?;
    info!(id = %id, "feedback stored");
    Ok(id)
}
