//! Local-first preference state with one-shot remote reconciliation.

use tracing::{debug, info, instrument, warn};

use crate::capabilities::{DocumentPath, LocalStore, RemoteError, StorageKey, TypedSlot};
use crate::context::RemoteTarget;
use crate::model::{LanguageCode, PreferencesPatch, UserPreferences};
use crate::task;

// Stored as a patch so documents written by older builds with missing fields
// still load; defaults are filled in on read.
const SLOT: TypedSlot<PreferencesPatch> = TypedSlot::new(StorageKey::UserPreferences);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceSync {
    current: UserPreferences,
    language_confirmed: bool,
}

impl PreferenceSync {
    /// Synchronous read with defaults: language falls back, theme is light,
    /// system-follow is on.
    pub fn load_initial(local: &dyn LocalStore, fallback_language: &LanguageCode) -> Self {
        let stored = SLOT.load(local).unwrap_or_default();
        let language_confirmed = stored.language.is_some();
        let mut current = UserPreferences::with_defaults(fallback_language.clone());
        current.apply(&stored);
        debug!(language_confirmed, "preferences loaded");
        Self {
            current,
            language_confirmed,
        }
    }

    #[must_use]
    pub fn current(&self) -> &UserPreferences {
        &self.current
    }

    /// False until a language has been stored, locally or remotely.
    #[must_use]
    pub fn language_confirmed(&self) -> bool {
        self.language_confirmed
    }

    /// Applies `patch` in memory, writes the full result locally, then
    /// schedules a best-effort remote merge of only the changed fields.
    #[instrument(skip_all, fields(fields = ?patch.field_names()))]
    pub fn save(
        &mut self,
        local: &dyn LocalStore,
        patch: PreferencesPatch,
        remote: Option<RemoteTarget>,
    ) {
        if patch.is_empty() {
            return;
        }
        self.current.apply(&patch);
        if patch.language.is_some() {
            self.language_confirmed = true;
        }
        // Failure is logged by the slot; in-memory state stays authoritative.
        let _ = SLOT.save(local, &PreferencesPatch::from(&self.current));

        let Some(target) = remote else {
            debug!("no remote identity, preference change kept local");
            return;
        };
        task::spawn_detached("preferences.merge", async move {
            let path = DocumentPath::preferences(&target.user);
            let fields = serde_json::to_value(&patch).map_err(|e| RemoteError::invalid(&path, e))?;
            target.store.merge(&path, fields).await
        });
    }

    pub async fn fetch_remote(
        target: &RemoteTarget,
    ) -> Result<Option<PreferencesPatch>, RemoteError> {
        let path = DocumentPath::preferences(&target.user);
        match target.store.get(&path).await? {
            Some(doc) => serde_json::from_value(doc)
                .map(Some)
                .map_err(|e| RemoteError::invalid(&path, e)),
            None => Ok(None),
        }
    }

    /// Remote values overwrite in-memory and local values for every field the
    /// remote document defines. Returns whether anything was applied.
    pub fn apply_remote(
        &mut self,
        local: &dyn LocalStore,
        fetched: Result<Option<PreferencesPatch>, RemoteError>,
    ) -> bool {
        let patch = match fetched {
            Ok(Some(patch)) if !patch.is_empty() => patch,
            Ok(_) => {
                debug!("no remote preferences, keeping local values");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "remote preferences fetch failed, keeping local values");
                return false;
            }
        };
        info!(fields = ?patch.field_names(), "applying remote preferences");
        self.current.apply(&patch);
        if patch.language.is_some() {
            self.language_confirmed = true;
        }
        let _ = SLOT.save(local, &PreferencesPatch::from(&self.current));
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{MemoryLocalStore, MemoryRemoteStore, RemoteCall};
    use crate::model::{Theme, UserId};
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn en() -> LanguageCode {
        LanguageCode::english()
    }

    fn target(store: Arc<MemoryRemoteStore>) -> RemoteTarget {
        RemoteTarget {
            store,
            user: UserId::new("u-1"),
        }
    }

    #[test]
    fn empty_store_yields_documented_defaults() {
        let sync = PreferenceSync::load_initial(&MemoryLocalStore::new(), &en());
        assert_eq!(sync.current().language, en());
        assert_eq!(sync.current().theme, Theme::Light);
        assert!(sync.current().use_system_theme);
        assert!(!sync.language_confirmed());
    }

    #[test]
    fn partial_document_fills_missing_fields() {
        let store =
            MemoryLocalStore::new().with_raw(StorageKey::UserPreferences, r#"{"language":"hi"}"#);
        let sync = PreferenceSync::load_initial(&store, &en());
        assert_eq!(sync.current().language.as_str(), "hi");
        assert!(sync.current().use_system_theme);
        assert!(sync.language_confirmed());
    }

    #[test]
    fn save_without_identity_stays_local() {
        let store = MemoryLocalStore::new();
        let mut sync = PreferenceSync::load_initial(&store, &en());
        sync.save(&store, PreferencesPatch::theme(Theme::Dark), None);

        let reloaded = PreferenceSync::load_initial(&store, &en());
        assert_eq!(reloaded.current().theme, Theme::Dark);
        assert!(reloaded.current().use_system_theme);
    }

    #[tokio::test]
    async fn save_merges_only_changed_fields_remotely() {
        let store = MemoryLocalStore::new();
        let remote = Arc::new(MemoryRemoteStore::new());
        let mut sync = PreferenceSync::load_initial(&store, &en());

        sync.save(&store, PreferencesPatch::theme(Theme::Dark), Some(target(Arc::clone(&remote))));
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            remote.calls(),
            vec![RemoteCall::Merge(
                DocumentPath::preferences(&UserId::new("u-1")),
                json!({"theme": "dark"})
            )]
        );
    }

    #[tokio::test]
    async fn failed_fetch_keeps_local_values() {
        let store = MemoryLocalStore::new();
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.set_offline(true);
        let mut sync = PreferenceSync::load_initial(&store, &en());
        sync.save(&store, PreferencesPatch::theme(Theme::Dark), None);

        assert!(!sync.reconcile_remote(&store, &target(remote)).await);
        assert_eq!(sync.current().theme, Theme::Dark);
    }

    #[tokio::test]
    async fn remote_fields_overwrite_local_one_by_one() {
        let store = MemoryLocalStore::new().with_raw(
            StorageKey::UserPreferences,
            r#"{"language":"hi","theme":"light","useSystemTheme":false}"#,
        );
        let remote = Arc::new(MemoryRemoteStore::new().with_document(
            DocumentPath::preferences(&UserId::new("u-1")),
            json!({"theme": "dark"}),
        ));
        let mut sync = PreferenceSync::load_initial(&store, &en());

        assert!(sync.reconcile_remote(&store, &target(remote)).await);

        let reloaded = PreferenceSync::load_initial(&store, &en());
        assert_eq!(reloaded.current().theme, Theme::Dark);
        assert_eq!(reloaded.current().language.as_str(), "hi");
        assert!(!reloaded.current().use_system_theme);
    }

    #[tokio::test]
    async fn malformed_remote_document_is_ignored() {
        let store = MemoryLocalStore::new();
        let remote = Arc::new(MemoryRemoteStore::new().with_document(
            DocumentPath::preferences(&UserId::new("u-1")),
            json!({"theme": "sepia"}),
        ));
        let mut sync = PreferenceSync::load_initial(&store, &en());
        assert!(!sync.reconcile_remote(&store, &target(remote)).await);
        assert_eq!(sync.current().theme, Theme::Light);
    }

    proptest! {
        #[test]
        fn local_copy_always_matches_memory_after_save(
            dark in any::<bool>(),
            follow in any::<bool>(),
        ) {
            let store = MemoryLocalStore::new();
            let mut sync = PreferenceSync::load_initial(&store, &en());
            let theme = if dark { Theme::Dark } else { Theme::Light };
            let patch = PreferencesPatch::use_system_theme(follow).and_theme(theme);
            sync.save(&store, patch, None);
            let reloaded = PreferenceSync::load_initial(&store, &en());
            prop_assert_eq!(reloaded.current(), sync.current());
        }
    }
}
