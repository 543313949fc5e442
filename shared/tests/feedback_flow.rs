mod common;

use common::{harness, STORED_PROFILE};
use shared::app::FeedbackStatus;
use shared::capabilities::{
    MemoryIdentityService, MemoryLocalStore, StorageKey, FEEDBACK_COLLECTION,
};
use shared::{Event, Overlay, UserId};

#[tokio::test]
async fn identified_feedback_is_stored_with_profile() {
    let local = MemoryLocalStore::new()
        .with_raw(StorageKey::UserPreferences, r#"{"language":"hi"}"#)
        .with_raw(StorageKey::UserProfile, STORED_PROFILE);
    let mut h = harness()
        .local(local)
        .identity(MemoryIdentityService::signed_in(UserId::new("reader-7")))
        .build();
    h.app.start();
    h.app.settle().await;

    h.app.update(Event::OverlayOpened(Overlay::Feedback));
    h.app.update(Event::FeedbackRequested {
        text: "  The digest PDFs are really helpful  ".into(),
    });
    assert_eq!(h.app.model().feedback, FeedbackStatus::Sending);
    h.app.settle().await;

    assert_eq!(h.app.model().feedback, FeedbackStatus::Sent);
    assert_eq!(h.app.model().overlay, None);

    let docs = h.remote.collection(FEEDBACK_COLLECTION);
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["userId"], "reader-7");
    assert_eq!(docs[0]["feedback"], "The digest PDFs are really helpful");
    assert_eq!(docs[0]["profile"]["username"], "Asha Rao");
    assert!(docs[0]["timestamp"].is_u64());
}

#[tokio::test]
async fn failed_submission_returns_to_idle() {
    let mut h = harness().build();
    h.app.start();
    h.app.settle().await;
    h.remote.set_offline(true);

    h.app.update(Event::OverlayOpened(Overlay::Feedback));
    h.app.update(Event::FeedbackRequested {
        text: "Please add more chapters".into(),
    });
    h.app.settle().await;

    assert_eq!(h.app.model().feedback, FeedbackStatus::Idle);
    assert_eq!(h.app.model().overlay, Some(Overlay::Feedback));
    assert_eq!(
        h.app.view().feedback_error.as_deref(),
        Some("Unable to connect. Please check your internet connection and try again.")
    );
}

#[tokio::test]
async fn disconnected_feedback_is_not_sent() {
    let mut h = harness().disconnected().build();
    h.app.start();

    h.app.update(Event::FeedbackRequested {
        text: "Please add more chapters".into(),
    });
    h.app.settle().await;

    assert_eq!(h.app.model().feedback, FeedbackStatus::Idle);
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn too_long_feedback_is_rejected_inline() {
    let mut h = harness().build();
    h.app.start();
    h.app.settle().await;

    h.app.update(Event::FeedbackRequested {
        text: "x".repeat(1001),
    });
    assert_eq!(
        h.app.model().feedback_error.as_deref(),
        Some("Feedback must be between 10 and 1000 characters (got 1001).")
    );
    assert!(h.remote.collection(FEEDBACK_COLLECTION).is_empty());
}
