//! Client behavior against a mock API server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use persona_core::api::{
    ApiClient, ApiErrorKind, CONNECTIVITY_MESSAGE, ClientOptions, Method, RequestOptions,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFRESH: &str = "/api/auth/refresh";

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(ClientOptions::new(server.uri())).unwrap()
}

fn token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"data": {"accessToken": token}}))
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(token_response("fresh-token").set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let results = join_all((0..5).map(|_| client.refresh())).await;

    assert!(results.iter().all(|r| r.as_deref() == Some("fresh-token")));
    assert_eq!(client.credential().as_deref(), Some("fresh-token"));
}

#[tokio::test]
async fn test_concurrent_failed_refreshes_all_see_none() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_credential(Some("stale".to_string()));

    let results = join_all((0..4).map(|_| client.refresh())).await;

    assert!(results.iter().all(Option::is_none));
    assert_eq!(client.credential(), None);
}

#[tokio::test]
async fn test_refresh_marker_clears_after_settling() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(token_response("again"))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.refresh().await.as_deref(), Some("again"));
    assert_eq!(client.refresh().await.as_deref(), Some("again"));
}

#[tokio::test]
async fn test_refresh_without_token_is_a_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_credential(Some("stale".to_string()));

    assert_eq!(client.refresh().await, None);
    assert_eq!(client.credential(), None);
}

#[tokio::test]
async fn test_refresh_sends_no_bearer_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(token_response("t"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_credential(Some("old".to_string()));
    client.refresh().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_persistent_401_retries_exactly_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/portfolio/my"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(token_response("new-token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_credential(Some("old-token".to_string()));

    let err = client.get("/api/portfolio/my").await.unwrap_err();
    assert_eq!(err.status, Some(401));
    assert_eq!(err.kind, ApiErrorKind::AuthExpired);
    assert_eq!(err.message, "Token expired");
}

#[tokio::test]
async fn test_retry_carries_refreshed_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"user": {"id": "u1"}}})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(token_response("T2"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_credential(Some("T1".to_string()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    client.on_credential_refreshed(move |token| seen_clone.lock().unwrap().push(token.to_string()));

    let json = client.get("/api/auth/me").await.unwrap();
    assert_eq!(json["data"]["user"]["id"], "u1");
    assert_eq!(*seen.lock().unwrap(), vec!["T2"]);
    assert_eq!(client.credential().as_deref(), Some("T2"));
}

#[tokio::test]
async fn test_failed_refresh_surfaces_original_401() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/portfolio/my"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Unauthorized"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_credential(Some("expired".to_string()));

    let err = client.get("/api/portfolio/my").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.message, "Unauthorized");
    assert_eq!(client.credential(), None);
}

#[tokio::test]
async fn test_retry_disabled_skips_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .execute(REFRESH, RequestOptions::new(Method::POST), false)
        .await
        .unwrap_err();
    assert_eq!(err.status, Some(401));
}

#[tokio::test]
async fn test_concurrent_401s_collapse_into_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/portfolio/my"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"portfolios": []}})))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/portfolio/my"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(token_response("fresh").set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_credential(Some("stale".to_string()));

    let refreshes = Arc::new(AtomicUsize::new(0));
    let refreshes_clone = Arc::clone(&refreshes);
    client.on_credential_refreshed(move |_| {
        refreshes_clone.fetch_add(1, Ordering::SeqCst);
    });

    let results = join_all((0..3).map(|_| client.get("/api/portfolio/my"))).await;
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cleared_credential_sends_no_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/themes/personal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"themes": []}})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_credential(Some("secret".to_string()));
    client.get("/api/themes/personal").await.unwrap();

    client.clear_credential();
    client.get("/api/themes/personal").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        "Bearer secret"
    );
    assert!(requests[1].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_validation_error_preserves_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation failed",
            "errors": [{"field": "email", "message": "Invalid email"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .post("/api/auth/register", Some(json!({"email": "nope"})))
        .await
        .unwrap_err();

    assert_eq!(err.message, "Validation failed");
    assert_eq!(err.status, Some(422));
    assert_eq!(err.kind, ApiErrorKind::Request);
    assert_eq!(err.data["errors"][0]["field"], "email");
    assert_eq!(err.field_errors()[0].field.as_deref(), Some("email"));
}

#[tokio::test]
async fn test_unparsable_error_body_falls_back() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/portfolio/my"))
        .respond_with(
            ResponseTemplate::new(502)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><body>Bad Gateway</body></html>"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get("/api/portfolio/my").await.unwrap_err();

    assert_eq!(err.message, "Request failed (502)");
    assert_eq!(err.data, json!({}));
}

#[tokio::test]
async fn test_empty_success_body_is_empty_object() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/portfolio/p1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let json = client.delete("/api/portfolio/p1").await.unwrap();
    assert_eq!(json, json!({}));
}

#[tokio::test]
async fn test_json_body_is_serialized_with_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"email": "a@b.io", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let json = client
        .post("/api/auth/login", Some(json!({"email": "a@b.io", "password": "pw"})))
        .await
        .unwrap();
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn test_text_body_passes_through_unchanged() {
    let server = MockServer::start().await;

    let raw = "{\"title\":   \"spacing kept\"}";
    Mock::given(method("PUT"))
        .and(path("/api/portfolio/p1"))
        .and(body_string(raw))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .execute(
            "/api/portfolio/p1",
            RequestOptions::new(Method::PUT).body(raw),
            true,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_transport_failure_is_connectivity_error() {
    let client = ApiClient::new(ClientOptions::new("http://127.0.0.1:1")).unwrap();

    let err = client.get("/api/auth/me").await.unwrap_err();
    assert!(err.is_connectivity());
    assert_eq!(err.message, CONNECTIVITY_MESSAGE);
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn test_refresh_cookie_travels_and_can_be_restored() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refreshToken=abc123; Path=/; HttpOnly")
                .set_body_json(json!({"data": {"accessToken": "t"}})),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(header("cookie", "refreshToken=abc123"))
        .respond_with(token_response("from-cookie"))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .post("/api/auth/login", Some(json!({"email": "a", "password": "b"})))
        .await
        .unwrap();

    let cookies = client.session_cookies().unwrap();
    assert_eq!(cookies, "refreshToken=abc123");
    assert_eq!(client.refresh().await.as_deref(), Some("from-cookie"));

    let revived = client_for(&server);
    revived.restore_session_cookies(&cookies);
    assert_eq!(revived.refresh().await.as_deref(), Some("from-cookie"));
}

#[tokio::test]
async fn test_rotated_refresh_cookie_replaces_restored_one() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(header("cookie", "refreshToken=OLD"))
        .respond_with(
            token_response("t1")
                .insert_header("set-cookie", "refreshToken=NEW; Path=/api/auth; HttpOnly"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(header("cookie", "refreshToken=NEW"))
        .respond_with(token_response("t2"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.restore_session_cookies("refreshToken=OLD");
    assert_eq!(client.refresh().await.as_deref(), Some("t1"));

    let saved = client.session_cookies().unwrap();
    assert_eq!(saved, "refreshToken=NEW");

    let next_run = client_for(&server);
    next_run.restore_session_cookies(&saved);
    assert_eq!(next_run.refresh().await.as_deref(), Some("t2"));
}

#[tokio::test]
async fn test_restore_keeps_first_value_of_repeated_cookie() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(header("cookie", "refreshToken=NEW"))
        .respond_with(token_response("t"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.restore_session_cookies("refreshToken=NEW; refreshToken=OLD");
    assert_eq!(client.session_cookies().as_deref(), Some("refreshToken=NEW"));
    assert_eq!(client.refresh().await.as_deref(), Some("t"));
}
