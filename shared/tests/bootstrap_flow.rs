mod common;

use common::harness;
use serde_json::json;
use shared::bootstrap::{DISCONNECTED_LABEL, FAILED_LABEL};
use shared::capabilities::{DocumentPath, MemoryIdentityService, RemoteCall, StorageKey};
use shared::model::Theme;
use shared::{Event, IdentityHandle, UserId};

#[tokio::test]
async fn disconnected_resolves_immediately_and_stays_local() {
    let mut h = harness().disconnected().build();
    h.app.start();

    assert_eq!(h.app.identity(), Some(&IdentityHandle::Disconnected));
    assert_eq!(h.app.view().identity_label.as_deref(), Some(DISCONNECTED_LABEL));

    h.app.update(Event::ToggleTheme);
    h.app.settle().await;

    assert!(h.remote.calls().is_empty());
    assert_eq!(h.identity.subscriber_count(), 0);
    let stored = h.local.raw(StorageKey::UserPreferences).unwrap();
    assert!(stored.contains(r#""useSystemTheme":false"#));
}

#[tokio::test]
async fn token_is_redeemed_once_and_reconciles() {
    let mut h = harness().token("one-time-token").build();
    h.app.start();
    h.app.settle().await;

    assert_eq!(h.identity.token_redemptions(), 1);
    assert_eq!(h.identity.anonymous_sign_ins(), 0);
    let user = h.identity.current_user().unwrap();
    assert_eq!(h.app.identity(), Some(&IdentityHandle::Identified(user.clone())));
    assert_eq!(h.app.view().identity_label.as_deref(), Some(user.as_str()));

    // Exactly one fetch of each document.
    let gets: Vec<_> = h
        .remote
        .calls()
        .into_iter()
        .filter(|c| matches!(c, RemoteCall::Get(_)))
        .collect();
    assert_eq!(
        gets,
        vec![
            RemoteCall::Get(DocumentPath::preferences(&user)),
            RemoteCall::Get(DocumentPath::profile(&user)),
        ]
    );

    // A later sign-out must not redeem the token again.
    h.identity.sign_out();
    h.app.settle().await;
    assert_eq!(h.identity.token_redemptions(), 1);
    assert_eq!(h.identity.anonymous_sign_ins(), 1);
}

#[tokio::test]
async fn without_token_signs_in_anonymously() {
    let mut h = harness().build();
    h.app.start();
    h.app.settle().await;

    assert_eq!(h.identity.token_redemptions(), 0);
    assert_eq!(h.identity.anonymous_sign_ins(), 1);
    assert!(matches!(h.app.identity(), Some(IdentityHandle::Identified(_))));
}

#[tokio::test]
async fn rejected_token_fails_without_anonymous_fallback() {
    let identity = MemoryIdentityService::new();
    identity.reject_token(true);
    let mut h = harness().identity(identity).token("expired").build();
    h.app.start();
    h.app.settle().await;

    assert_eq!(h.app.identity(), Some(&IdentityHandle::Failed));
    assert_eq!(h.app.view().identity_label.as_deref(), Some(FAILED_LABEL));
    assert_eq!(h.identity.anonymous_sign_ins(), 0);
    assert!(h.remote.calls().is_empty());

    // Local persistence still works after a failed bootstrap.
    h.app.update(Event::ToggleTheme);
    h.app.settle().await;
    assert!(h.local.raw(StorageKey::UserPreferences).is_some());
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn anonymous_failure_resolves_failed() {
    let identity = MemoryIdentityService::new();
    identity.reject_anonymous(true);
    let mut h = harness().identity(identity).build();
    h.app.start();
    h.app.settle().await;

    assert_eq!(h.app.identity(), Some(&IdentityHandle::Failed));
}

#[tokio::test]
async fn replayed_notice_does_not_reconcile_twice() {
    let user = UserId::new("returning-user");
    let mut h = harness()
        .identity(MemoryIdentityService::signed_in(user.clone()))
        .build();
    h.app.start();
    h.app.settle().await;
    assert_eq!(h.app.identity(), Some(&IdentityHandle::Identified(user.clone())));

    h.identity.replay();
    h.identity.replay();
    h.app.settle().await;

    let gets = h
        .remote
        .calls()
        .iter()
        .filter(|c| matches!(c, RemoteCall::Get(_)))
        .count();
    assert_eq!(gets, 2);
    assert_eq!(h.identity.anonymous_sign_ins(), 0);
}

#[tokio::test]
async fn dropping_the_app_releases_the_identity_listener() {
    let mut h = harness().build();
    h.app.start();
    h.app.settle().await;
    assert_eq!(h.identity.subscriber_count(), 1);

    let identity = h.identity.clone();
    drop(h);
    assert_eq!(identity.subscriber_count(), 0);
}

#[tokio::test]
async fn snapshot_for_a_previous_identity_is_discarded() {
    let user = UserId::new("current");
    let mut h = harness()
        .identity(MemoryIdentityService::signed_in(user.clone()))
        .build();
    h.app.start();
    h.app.settle().await;

    h.app.update(Event::RemoteSnapshotFetched(Box::new(shared::event::RemoteSnapshot {
        user: UserId::new("someone-else"),
        preferences: Ok(Some(
            serde_json::from_value(json!({"theme": "dark", "useSystemTheme": false})).unwrap(),
        )),
        profile: Ok(None),
    })));

    assert_eq!(h.app.view().theme, Theme::Light);
    assert!(h.app.view().use_system_theme);
}
