
use reqwest::StatusCode;
use serde_json::{json, Value};
use test_utils::*;

#[actix_rt::test]
async fn sign_up_returns_tokens_and_profile() {
    let app = TestApp::spawn().await;

    let auth = app.signed_up("test@example.com", "Test User").await;

    assert!(!access_token(&auth).is_empty());
    assert!(auth["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(auth["token_type"], "Bearer");
    assert_eq!(auth["user"]["email"], "test@example.com");
    assert_eq!(auth["user"]["name"], "Test User");
}

#[actix_rt::test]
async fn duplicate_and_weak_sign_ups_are_rejected() {
    let app = TestApp::spawn().await;
    app.signed_up("test@example.com", "Test User").await;

    let response = app.sign_up("test@example.com", "Again").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.client
        .post(app.url("/auth/sign-up"))
        .json(&json!({"email": "weak@example.com", "password": "password", "name": "Weak"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn sign_in_checks_the_password() {
    let app = TestApp::spawn().await;
    app.signed_up("test@example.com", "Test User").await;

    let response = app.client
        .post(app.url("/auth/sign-in"))
        .json(&json!({"email": "test@example.com", "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.client
        .post(app.url("/auth/sign-in"))
        .json(&json!({"email": "test@example.com", "password": "WrongPass123!"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn google_sign_in_creates_a_profile() {
    let app = TestApp::spawn().await;

    let response = app.client
        .post(app.url("/auth/google"))
        .json(&json!({"id_token": GOOGLE_TEST_TOKEN}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let auth: Value = response.json().await.unwrap();
    assert_eq!(auth["user"]["email"], "googler@example.com");
    assert_eq!(auth["user"]["name"], "Goo Gler");

    let response = app.client
        .post(app.url("/auth/google"))
        .json(&json!({"id_token": "forged"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn profile_can_be_read_and_updated() {
    let app = TestApp::spawn().await;
    let auth = app.signed_up("test@example.com", "Test User").await;
    let token = access_token(&auth);

    let response = app.client
        .get(app.url("/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.client
        .patch(app.url("/users/me"))
        .bearer_auth(&token)
        .json(&json!({"name": "Renamed", "avatar": "https://example.com/me.png"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user_id = auth["user"]["id"].as_str().unwrap();
    let (status, user) = app.get_json(&format!("/users/{}", user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["name"], "Renamed");
    assert_eq!(user["avatar"], "https://example.com/me.png");

    let (status, _) = app.get_json("/users/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn protected_endpoints_require_auth() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/users/me")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.client
        .get(app.url("/users/me"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A bad token on a public route is ignored.
    let response = app.client
        .get(app.url("/projects/featured"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn refresh_tokens_rotate() {
    let app = TestApp::spawn().await;
    let auth = app.signed_up("test@example.com", "Test User").await;
    let refresh = auth["refresh_token"].as_str().unwrap();

    let response = app.client
        .post(app.url("/auth/refresh"))
        .json(&json!({"refresh_token": refresh}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rotated: Value = response.json().await.unwrap();
    assert_ne!(rotated["refresh_token"], auth["refresh_token"]);

    let response = app.client
        .post(app.url("/auth/refresh"))
        .json(&json!({"refresh_token": refresh}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn sign_out_revokes_the_access_token() {
    let app = TestApp::spawn().await;
    let auth = app.signed_up("test@example.com", "Test User").await;
    let token = access_token(&auth);

    let response = app.client
        .post(app.url("/auth/sign-out"))
        .bearer_auth(&token)
        .json(&json!({"refresh_token": auth["refresh_token"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.client
        .get(app.url("/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.client
        .post(app.url("/auth/refresh"))
        .json(&json!({"refresh_token": auth["refresh_token"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn auth_state_stream_starts_with_the_current_user() {
    let app = TestApp::spawn().await;
    let auth = app.signed_up("test@example.com", "Test User").await;

    let mut response = app.client
        .get(app.url("/auth/state/live"))
        .bearer_auth(access_token(&auth))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let chunk = response.chunk().await.unwrap().expect("no event received");
    let line = std::str::from_utf8(&chunk).unwrap();
    let event: Value = serde_json::from_str(
        line.trim().strip_prefix("data: ").expect("not an SSE data line"),
    )
    .unwrap();
    assert_eq!(event["kind"], "current");
    assert_eq!(event["user"]["email"], "test@example.com");
}
