//! Authentication endpoints bypass bearer attachment and renewal.

use super::harness::{
    count_ended, live_session, record_events, signed_out_client, MockBackend, Scripted, PASSWORD,
};
use crate::{ApiRequest, ErrorKind, FieldError, HttpMethod, HttpResponse, SessionEvent};
use serde_json::json;

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let backend = MockBackend::new();
    let client = signed_out_client(&backend);
    let events = record_events(&client);

    let err = client.login("ada@example.com", "wrong").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    assert_eq!(err.message(), "Invalid email or password");
    assert_eq!(err.code(), Some("invalid_credentials"));

    assert_eq!(backend.renewal_calls(), 0);
    assert_eq!(backend.calls_to("/auth/login").len(), 1, "never retried");
    assert!(!client.is_signed_in());
    assert!(events.lock().is_empty());
}

#[tokio::test]
async fn wrong_password_while_signed_in_keeps_session() {
    let backend = MockBackend::new();
    let (client, token) = live_session(&backend);
    let events = record_events(&client);

    let err = client.login("ada@example.com", "wrong").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);

    let login = &backend.calls_to("/auth/login")[0];
    assert_eq!(login.method, HttpMethod::Post);
    assert!(login.bearer.is_none(), "login never carries a bearer");
    assert_eq!(backend.renewal_calls(), 0);
    assert_eq!(count_ended(&events), 0);
    assert_eq!(client.credential().unwrap().access_token(), token);
}

#[tokio::test]
async fn login_installs_credential() {
    let backend = MockBackend::new();
    let client = signed_out_client(&backend);
    let events = record_events(&client);

    let identity = client.login("ada@example.com", PASSWORD).await.unwrap();
    let identity = identity.unwrap();
    assert_eq!(identity.id.as_deref(), Some("1"));
    assert_eq!(identity.email.as_deref(), Some("ada@example.com"));

    assert!(client.is_signed_in());
    assert_eq!(client.identity(), Some(identity.clone()));
    assert_eq!(
        *events.lock(),
        vec![SessionEvent::SignedIn {
            identity: Some(identity)
        }]
    );

    client.get("/me").await.unwrap();
    let me = &backend.calls_to("/me")[0];
    assert_eq!(
        me.bearer.as_deref(),
        Some(client.credential().unwrap().access_token())
    );
}

#[tokio::test]
async fn rejected_renewal_endpoint_is_not_renewed() {
    let backend = MockBackend::new();
    let (client, _) = live_session(&backend);
    backend.script(
        "/auth/refresh",
        Scripted::Respond(HttpResponse::new(401, "")),
    );

    let err = client
        .send(ApiRequest::post("/auth/refresh").json(json!({"refresh_token": "x"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionExpired);
    assert_eq!(backend.renewal_calls(), 1, "only the caller's own request");
    assert_eq!(client.renewals_started(), 0);
    assert!(backend.calls_to("/auth/refresh")[0].bearer.is_none());
}

#[tokio::test]
async fn register_validation_error() {
    let backend = MockBackend::new();
    let client = signed_out_client(&backend);

    let err = client
        .register(json!({"email": "taken@example.com", "password": "pw"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert_eq!(
        err.field_errors(),
        &[FieldError::new("email", "is already registered")]
    );
    assert!(backend.calls_to("/auth/register")[0].bearer.is_none());
}

#[tokio::test]
async fn register_without_credential_leaves_session_alone() {
    let backend = MockBackend::new();
    let client = signed_out_client(&backend);

    let registration = client
        .register(json!({"email": "new@example.com", "password": "pw"}))
        .await
        .unwrap();
    assert!(!registration.signed_in);
    assert_eq!(
        registration.identity.unwrap().email.as_deref(),
        Some("new@example.com")
    );
    assert!(!client.is_signed_in());
}

#[tokio::test]
async fn register_with_credential_signs_in() {
    let backend = MockBackend::new();
    let client = signed_out_client(&backend);
    let token = crate::credential::test_tokens::jwt("fresh", 3600);
    backend.accept(&token);
    backend.script(
        "/auth/register",
        Scripted::Respond(HttpResponse::new(
            201,
            json!({"accessToken": token, "refreshToken": "r", "user": {"id": "u-9"}}).to_string(),
        )),
    );

    let registration = client.register(json!({"email": "n@example.com"})).await.unwrap();
    assert!(registration.signed_in);
    assert_eq!(registration.identity.unwrap().id.as_deref(), Some("u-9"));
    assert_eq!(client.credential().unwrap().refresh_token(), Some("r"));
    client.get("/me").await.unwrap();
}

#[tokio::test]
async fn login_rate_limited() {
    let backend = MockBackend::new();
    let client = signed_out_client(&backend);
    backend.script(
        "/auth/login",
        Scripted::Respond(HttpResponse::new(429, "").with_header("Retry-After", "12")),
    );

    let err = client.login("ada@example.com", PASSWORD).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooManyRequests);
    assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(12)));
}

#[tokio::test]
async fn login_grant_with_unrepresentable_lifetime_is_rejected() {
    let backend = MockBackend::new();
    let client = signed_out_client(&backend);
    let events = record_events(&client);
    backend.script(
        "/auth/login",
        Scripted::Respond(HttpResponse::new(
            200,
            r#"{"access_token": "opaque", "expires_in": 9223372036854775807}"#,
        )),
    );

    let err = client.login("ada@example.com", PASSWORD).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownError);
    assert_eq!(err.status(), Some(200));
    assert!(!client.is_signed_in());
    assert!(events.lock().is_empty());
}

#[tokio::test]
async fn other_origins_never_see_the_credential() {
    let backend = MockBackend::new();
    let (client, token) = live_session(&backend);
    let events = record_events(&client);

    let err = client
        .get("https://files.example.com/upload")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownError);
    assert_eq!(err.status(), Some(401));

    let call = &backend.calls_to("https://files.example.com/upload")[0];
    assert!(call.bearer.is_none());
    assert_eq!(backend.renewal_calls(), 0);
    assert_eq!(count_ended(&events), 0);
    assert_eq!(client.credential().unwrap().access_token(), token);

    // The backend's own absolute URLs still carry it
    client.get(&format!("{}/me", super::harness::BASE_URL)).await.unwrap();
    assert_eq!(
        backend.calls_to("/me")[0].bearer.as_deref(),
        Some(token.as_str())
    );
}
