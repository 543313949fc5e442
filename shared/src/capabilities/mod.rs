//! Capability traits at the I/O seams, plus in-memory implementations.
//!
//! Shells provide the production implementations; the in-memory ones back
//! development builds and tests.

mod identity;
mod local_store;
mod os_theme;
mod remote;
mod subscription;
mod translate;

pub use self::identity::{IdentityError, IdentityNotice, IdentityService, MemoryIdentityService};
pub use self::local_store::{
    LocalStore, LocalStoreError, MemoryLocalStore, StorageErrorCode, StorageKey, TypedSlot,
    MAX_VALUE_SIZE,
};
pub use self::os_theme::{ManualOsTheme, OsThemeSource};
pub use self::remote::{
    is_server_timestamp, server_timestamp, DocumentPath, MemoryRemoteStore, RemoteCall,
    RemoteError, RemoteStore, FEEDBACK_COLLECTION,
};
pub use self::subscription::{Listener, ListenerSet, Subscription};
pub use self::translate::{checked_output, TranslationError, Translator};

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub use self::local_store::SqliteLocalStore;

