mod common;

use common::{harness, STORED_PROFILE};
use shared::capabilities::{MemoryLocalStore, StorageKey};
use shared::{Screen, Theme};

#[test]
fn first_launch_asks_for_a_language() {
    let h = harness().disconnected().build();
    let view = h.app.view();
    assert_eq!(view.route.screen(), Screen::LanguageSelect);
    assert_eq!(view.language.as_str(), "en");
    assert_eq!(view.app_opens, 1);
}

#[test]
fn stored_language_without_profile_goes_to_onboarding() {
    let local =
        MemoryLocalStore::new().with_raw(StorageKey::UserPreferences, r#"{"language":"hi"}"#);
    let h = harness().local(local).disconnected().build();

    let view = h.app.view();
    assert_eq!(view.route.screen(), Screen::Onboarding);
    assert_eq!(view.language.as_str(), "hi");
    assert!(view.use_system_theme);
}

#[test]
fn language_and_profile_go_home() {
    let local = MemoryLocalStore::new()
        .with_raw(StorageKey::UserPreferences, r#"{"language":"mr"}"#)
        .with_raw(StorageKey::UserProfile, STORED_PROFILE);
    let h = harness().local(local).disconnected().build();

    let view = h.app.view();
    assert_eq!(view.route.screen(), Screen::Home);
    assert_eq!(view.username.as_deref(), Some("Asha Rao"));
}

#[test]
fn corrupt_profile_is_treated_as_absent() {
    let local = MemoryLocalStore::new()
        .with_raw(StorageKey::UserPreferences, r#"{"language":"hi"}"#)
        .with_raw(StorageKey::UserProfile, "{not json");
    let h = harness().local(local).disconnected().build();

    assert_eq!(h.app.navigation().screen(), Screen::Onboarding);
    assert!(h.app.view().username.is_none());
}

#[test]
fn blank_username_is_treated_as_absent() {
    let local = MemoryLocalStore::new()
        .with_raw(StorageKey::UserPreferences, r#"{"language":"hi"}"#)
        .with_raw(
            StorageKey::UserProfile,
            r#"{"username":"   ","school":"Sunrise","standard":"10th"}"#,
        );
    let h = harness().local(local).disconnected().build();

    assert_eq!(h.app.navigation().screen(), Screen::Onboarding);
}

#[test]
fn partial_preferences_fill_in_defaults() {
    let local = MemoryLocalStore::new().with_raw(
        StorageKey::UserPreferences,
        r#"{"theme":"dark","useSystemTheme":false}"#,
    );
    let h = harness().local(local).os_theme(Theme::Light).disconnected().build();

    let view = h.app.view();
    // No language stored yet, so it has not been confirmed.
    assert_eq!(view.route.screen(), Screen::LanguageSelect);
    assert_eq!(view.language.as_str(), "en");
    assert_eq!(view.theme, Theme::Dark);
}

#[test]
fn malformed_stored_language_keeps_the_stored_theme() {
    let local = MemoryLocalStore::new().with_raw(
        StorageKey::UserPreferences,
        r#"{"language":"pt_BR","theme":"dark","useSystemTheme":false}"#,
    );
    let h = harness().local(local).os_theme(Theme::Light).disconnected().build();

    let view = h.app.view();
    assert_eq!(view.route.screen(), Screen::LanguageSelect);
    assert_eq!(view.language.as_str(), "en");
    assert_eq!(view.theme, Theme::Dark);
    assert!(!view.use_system_theme);
}

#[test]
fn corrupt_preferences_fall_back_to_defaults() {
    let local = MemoryLocalStore::new().with_raw(StorageKey::UserPreferences, "][");
    let h = harness().local(local).os_theme(Theme::Dark).disconnected().build();

    let view = h.app.view();
    assert_eq!(view.route.screen(), Screen::LanguageSelect);
    assert!(view.use_system_theme);
    assert_eq!(view.theme, Theme::Dark);
}

#[test]
fn startup_makes_no_remote_calls() {
    let local = MemoryLocalStore::new()
        .with_raw(StorageKey::UserPreferences, r#"{"language":"hi"}"#)
        .with_raw(StorageKey::UserProfile, STORED_PROFILE);
    let h = harness().local(local).build();

    assert_eq!(h.app.navigation().screen(), Screen::Home);
    assert!(h.remote.calls().is_empty());
    assert!(h.app.view().identity_label.is_none());
}

#[test]
fn app_opens_survive_restarts() {
    let h = harness().disconnected().build();
    let raw = h.local.raw(StorageKey::AppOpens).unwrap();

    let again = harness()
        .local(MemoryLocalStore::new().with_raw(StorageKey::AppOpens, raw))
        .disconnected()
        .build();
    assert_eq!(again.app.view().app_opens, 2);
}
