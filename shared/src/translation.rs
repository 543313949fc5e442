use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capabilities::{
    checked_output, LocalStore, StorageKey, TranslationError, Translator, TypedSlot,
};
use crate::model::{LanguageCode, TranslationHistory, TranslationHistoryItem, ValidationError};
use crate::AppError;

const HISTORY: TypedSlot<Vec<TranslationHistoryItem>> =
    TypedSlot::new(StorageKey::TranslationHistory);

pub const AUTO_DETECT: &str = "auto";

/// One translation call, tagged so a late result for an older request can
/// be recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub seq: u64,
    pub text: String,
    pub source: LanguageCode,
    pub target: LanguageCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatorPanel {
    input: String,
    output: String,
    source: LanguageCode,
    target: LanguageCode,
    error: Option<String>,
    busy: bool,
    history: TranslationHistory,
    #[serde(skip)]
    seq: u64,
}

impl TranslatorPanel {
    /// Defaults to English into Hindi. Unreadable history starts empty.
    pub fn load(local: &dyn LocalStore, history_cap: usize) -> Self {
        let items = HISTORY.load(local).unwrap_or_default();
        Self {
            input: String::new(),
            output: String::new(),
            source: LanguageCode::english(),
            target: LanguageCode::new("hi").unwrap_or_else(|_| LanguageCode::english()),
            error: None,
            busy: false,
            history: TranslationHistory::from_items(items, history_cap),
            seq: 0,
        }
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    #[must_use]
    pub fn source(&self) -> &LanguageCode {
        &self.source
    }

    #[must_use]
    pub fn target(&self) -> &LanguageCode {
        &self.target
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    #[must_use]
    pub fn history(&self) -> &TranslationHistory {
        &self.history
    }

    pub fn set_input(&mut self, input: String) {
        self.input = input;
    }

    pub fn set_source(&mut self, source: LanguageCode) {
        self.source = source;
    }

    /// `auto` is only meaningful as a source.
    pub fn set_target(&mut self, target: LanguageCode) -> bool {
        if target.as_str() == AUTO_DETECT {
            return false;
        }
        self.target = target;
        true
    }

    /// Blank input is rejected inline without calling the translator.
    pub fn begin(&mut self) -> Result<TranslationRequest, ValidationError> {
        if self.input.trim().is_empty() {
            let err = ValidationError::EmptyTranslationInput;
            self.error = Some(err.to_string());
            return Err(err);
        }
        self.seq += 1;
        self.error = None;
        self.output.clear();
        self.busy = true;
        Ok(TranslationRequest {
            seq: self.seq,
            text: self.input.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
        })
    }

    /// Returns false for a stale result, which is dropped.
    pub fn finish(
        &mut self,
        local: &dyn LocalStore,
        request: TranslationRequest,
        result: Result<String, TranslationError>,
    ) -> bool {
        if request.seq != self.seq {
            debug!(seq = request.seq, latest = self.seq, "dropping stale translation");
            return false;
        }
        self.busy = false;
        match result.and_then(checked_output) {
            Ok(output) => {
                self.output.clone_from(&output);
                self.history.push(TranslationHistoryItem {
                    input: request.text,
                    output,
                    source_lang_code: request.source,
                    target_lang_code: request.target,
                });
                let _ = HISTORY.save(local, &self.history.to_vec());
            }
            Err(e) => {
                warn!(error = %e, "translation failed");
                self.error = Some(AppError::from(e).user_facing_message());
            }
        }
        true
    }

    pub async fn translate(&mut self, local: &dyn LocalStore, translator: &dyn Translator) -> bool {
        let Ok(request) = self.begin() else {
            return false;
        };
        let result = translator
            .translate(&request.text, &request.source, &request.target)
            .await;
        self.finish(local, request, result)
    }

    /// Not available while the source is `auto`.
    pub fn swap(&mut self) -> bool {
        if self.source.as_str() == AUTO_DETECT {
            return false;
        }
        std::mem::swap(&mut self.source, &mut self.target);
        true
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
        self.error = None;
    }

    pub fn restore(&mut self, index: usize) -> bool {
        let Some(item) = self.history.get(index).cloned() else {
            return false;
        };
        self.input = item.input;
        self.output = item.output;
        self.source = item.source_lang_code;
        self.target = item.target_lang_code;
        self.error = None;
        true
    }

    pub fn clear_history(&mut self, local: &dyn LocalStore) {
        self.history.clear();
        let _ = HISTORY.clear(local);
    }
}
