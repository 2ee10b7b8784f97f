//! Session events and the once-per-episode latch.

use super::harness::{
    count_ended, expired_session, record_events, revoked_session, wait_for_pending, MockBackend,
    RenewalScript, PASSWORD,
};
use crate::{ErrorKind, Failure, SessionEvent};
use futures::future::join_all;

#[tokio::test]
async fn five_failed_callers_one_notification() {
    let backend = MockBackend::new();
    backend.set_renewal(RenewalScript::Status(401));
    let client = expired_session(&backend);
    let events = record_events(&client);

    let results = join_all((0..5).map(|i| {
        let client = client.clone();
        async move { client.get(&format!("/feed/{}", i)).await }
    }))
    .await;

    for result in results {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::SessionExpired);
    }
    assert_eq!(backend.renewal_calls(), 1);
    assert_eq!(count_ended(&events), 1);
}

#[tokio::test]
async fn renewal_rearms_the_latch() {
    let backend = MockBackend::new();
    let client = expired_session(&backend);
    let events = record_events(&client);

    client.get("/a").await.unwrap();
    assert!(matches!(
        events.lock().as_slice(),
        [SessionEvent::Renewed { .. }]
    ));

    backend.revoke_all();
    backend.set_renewal(RenewalScript::Status(401));
    client.get("/b").await.unwrap_err();
    assert_eq!(count_ended(&events), 1);

    // Signed out now: further failures are not new episodes
    client.get("/c").await.unwrap_err();
    assert_eq!(count_ended(&events), 1);

    // A fresh login starts a new session that can end again
    client.login("ada@example.com", PASSWORD).await.unwrap();
    backend.revoke_all();
    client.get("/d").await.unwrap_err();
    assert_eq!(count_ended(&events), 2);
}

#[tokio::test]
async fn logout_is_not_a_session_end() {
    let backend = MockBackend::new();
    let client = expired_session(&backend);
    let events = record_events(&client);

    client.logout();
    assert!(!client.is_signed_in());
    assert_eq!(*events.lock(), vec![SessionEvent::SignedOut]);

    client.get("/me").await.unwrap_err();
    assert_eq!(count_ended(&events), 0);
}

#[tokio::test]
async fn logout_during_renewal_discards_renewed_credential() {
    let backend = MockBackend::new();
    backend.gate_renewal();
    let client = revoked_session(&backend);
    let events = record_events(&client);

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.get("/me").await }
    });
    wait_for_pending(&client, 1).await;

    client.logout();
    backend.release_renewal();

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionExpired);
    assert!(matches!(err.failure(), Some(Failure::SessionReplaced)));
    assert!(!client.is_signed_in(), "renewal must not resurrect the session");
    assert_eq!(count_ended(&events), 0);
    assert_eq!(*events.lock(), vec![SessionEvent::SignedOut]);
}

#[tokio::test]
async fn unsubscribed_listener_hears_nothing() {
    let backend = MockBackend::new();
    let client = expired_session(&backend);
    let events = record_events(&client);
    let extra = std::sync::Arc::new(parking_lot::Mutex::new(0usize));
    let sink = std::sync::Arc::clone(&extra);
    let id = client.subscribe(move |_| *sink.lock() += 1);

    assert!(client.unsubscribe(id));
    client.logout();

    assert_eq!(*extra.lock(), 0);
    assert_eq!(events.lock().len(), 1);
}
