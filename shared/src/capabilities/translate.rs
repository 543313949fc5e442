use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::LanguageCode;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TranslationError {
    #[error("translation service error: {message}")]
    Service { message: String },

    #[error("translation service returned an empty response")]
    EmptyResponse,

    #[error("no translator configured")]
    Unavailable,
}

/// Text translation collaborator. `source` may be `auto`.
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> Result<String, TranslationError>;
}

/// Treats a blank result as a failure.
pub fn checked_output(raw: String) -> Result<String, TranslationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(TranslationError::EmptyResponse)
    } else if trimmed.len() == raw.len() {
        Ok(raw)
    } else {
        Ok(trimmed.to_string())
    }
}
