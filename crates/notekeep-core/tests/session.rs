//! Refresh-and-retry protocol tests against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use notekeep_core::auth::MemoryTokenStore;
use notekeep_core::{ApiError, SessionManager, TokenPair};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_for(server: &MockServer) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(server.uri(), Box::new(MemoryTokenStore::new())).unwrap())
}

fn pair(access: &str, refresh: &str) -> TokenPair {
    TokenPair {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
    }
}

fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({ "access_token": access, "refresh_token": refresh })
}

#[tokio::test]
async fn refresh_rotates_both_tokens() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .and(body_json(serde_json::json!({ "refresh_token": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A2", "R2")))
        .expect(1)
        .mount(&server)
        .await;

    let access = session.refresh().await.unwrap();
    assert_eq!(access, "A2");
    assert_eq!(session.access_token().as_deref(), Some("A2"));
}

#[tokio::test]
async fn refresh_uses_rotated_refresh_token_next_time() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .and(body_json(serde_json::json!({ "refresh_token": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A2", "R2")))
        .expect(1)
        .mount(&server)
        .await;
    // R1 is gone after the first rotation; only R2 is accepted
    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .and(body_json(serde_json::json!({ "refresh_token": "R2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A3", "R3")))
        .expect(1)
        .mount(&server)
        .await;

    session.refresh().await.unwrap();
    let access = session.refresh().await.unwrap();
    assert_eq!(access, "A3");
    assert_eq!(session.access_token().as_deref(), Some("A3"));
}

#[tokio::test]
async fn refresh_without_stored_tokens_fails_with_auth_error() {
    let server = MockServer::start().await;
    let session = session_for(&server);

    // No request must reach the refresh endpoint
    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = session.refresh().await.unwrap_err();
    assert!(err.is_auth(), "expected Auth error, got {err:?}");
    assert!(!session.is_logged_in());
}

#[tokio::test]
async fn rejected_refresh_forces_logout() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(&server)
        .await;

    let err = session.refresh().await.unwrap_err();
    assert!(err.is_auth(), "expected Auth error, got {err:?}");
    assert!(!session.is_logged_in());
    assert!(session.access_token().is_none());
}

#[tokio::test]
async fn unparseable_refresh_response_forces_logout() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    // 200 but not a token pair; the old pair may already be revoked
    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = session.refresh().await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)), "got {err:?}");
    assert!(!session.is_logged_in());
    assert!(session.access_token().is_none());
}

#[tokio::test]
async fn authorized_fetch_refreshes_once_and_retries() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    // Stale token is rejected exactly once, fresh token accepted
    Mock::given(method("GET"))
        .and(path("/notes/get_all_notes"))
        .and(header("Authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notes/get_all_notes"))
        .and(header("Authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A2", "R2")))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/notes/get_all_notes", server.uri());
    let response = session
        .authorized_fetch(|client| client.get(&url))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(session.access_token().as_deref(), Some("A2"));
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn authorized_fetch_without_session_fails_before_sending() {
    let server = MockServer::start().await;
    let session = session_for(&server);

    // Neither the data endpoint nor the refresh endpoint may be hit
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let url = format!("{}/ping", server.uri());
    let err = session
        .authorized_fetch(|client| client.get(&url))
        .await
        .unwrap_err();
    assert!(err.is_auth(), "expected Auth error, got {err:?}");
}

#[tokio::test]
async fn second_auth_failure_forces_logout_and_surfaces_error() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    // Endpoint rejects the session no matter which token is presented
    Mock::given(method("GET"))
        .and(path("/notes/get_all_notes"))
        .respond_with(ResponseTemplate::new(401).set_body_string("account disabled"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A2", "R2")))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/notes/get_all_notes", server.uri());
    let err = session
        .authorized_fetch(|client| client.get(&url))
        .await
        .unwrap_err();

    assert!(err.is_auth(), "expected Auth error, got {err:?}");
    assert!(!session.is_logged_in());
}

#[tokio::test]
async fn concurrent_calls_share_one_refresh() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    Mock::given(method("GET"))
        .and(path("/notes/get_all_notes"))
        .and(header("Authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/notes/get_all_notes"))
        .and(header("Authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    // Slow refresh so the callers overlap; must be hit exactly once
    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("A2", "R2"))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/notes/get_all_notes", server.uri());
    let calls = (0..3).map(|_| {
        let session = Arc::clone(&session);
        let url = url.clone();
        async move { session.authorized_fetch(|client| client.get(&url)).await }
    });

    for result in futures::future::join_all(calls).await {
        assert_eq!(result.unwrap().status(), 200);
    }
    assert_eq!(session.access_token().as_deref(), Some("A2"));
}

#[tokio::test]
async fn network_error_on_data_call_keeps_session() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    // Data endpoint on a dead port; the refresh endpoint is never needed
    let err = session
        .authorized_fetch(|client| client.get("http://127.0.0.1:1/notes/get_all_notes"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
    assert!(session.is_logged_in());
    assert_eq!(session.access_token().as_deref(), Some("A1"));
}

#[tokio::test]
async fn proactive_refresh_keeps_token_fresh() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("A2", "R2")))
        .mount(&server)
        .await;

    let handle = Arc::clone(&session).spawn_proactive_refresh(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(80)).await;
    handle.abort();

    assert_eq!(session.access_token().as_deref(), Some("A2"));
    assert!(session.is_logged_in());
}

#[tokio::test]
async fn failed_proactive_refresh_forces_logout() {
    let server = MockServer::start().await;
    let session = session_for(&server);
    session.set_tokens(pair("A1", "R1")).unwrap();

    Mock::given(method("POST"))
        .and(path("/user/refresh_tokens/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
        .mount(&server)
        .await;

    let handle = Arc::clone(&session).spawn_proactive_refresh(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(!session.is_logged_in());
    assert!(!handle.is_finished(), "task keeps ticking for a later login");
    handle.abort();
}
