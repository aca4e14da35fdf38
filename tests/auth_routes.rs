//! HTTP-level tests for the auth routes: sign-up/sign-in round trip,
//! validation failures, lockout behavior and the bearer guard.

use hushzone_api::auth::{AuthState, JwtService, routes as auth_routes};
use hushzone_api::test_support::{TestDatabase, TestRocketBuilder, test_auth_config};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::{Value, json};

async fn auth_client(db: &TestDatabase) -> Client {
    let state =
        AuthState::from_config(test_auth_config(), db.pool_clone()).expect("auth state wires up");

    TestRocketBuilder::new()
        .manage_pg_pool(db.pool_clone())
        .manage_auth_state(state)
        .mount_api_routes(rocket::routes![
            auth_routes::sign_up,
            auth_routes::sign_in,
            auth_routes::refresh,
            auth_routes::logout,
            auth_routes::me,
        ])
        .async_client()
        .await
}

async fn post_json(client: &Client, uri: &str, body: Value) -> (Status, Value) {
    let response = client
        .post(uri)
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .await;
    let status = response.status();
    let payload = response
        .into_json::<Value>()
        .await
        .unwrap_or_else(|| json!({}));
    (status, payload)
}

#[tokio::test]
async fn sign_up_then_sign_in_returns_usable_tokens() {
    let db = TestDatabase::new().await.expect("test database");
    let client = auth_client(&db).await;

    let (status, body) = post_json(
        &client,
        "/api/v1/auth/signup",
        json!({"email": "A@B.com", "password": "Abcd1234!", "username": "ada"}),
    )
    .await;
    assert_eq!(status, Status::Created);
    let user_id = body["user_id"].as_str().expect("user id").to_string();
    assert!(!body["tokens"]["access_token"].as_str().unwrap().is_empty());
    assert!(!body["tokens"]["refresh_token"].as_str().unwrap().is_empty());

    let (status, body) = post_json(
        &client,
        "/api/v1/auth/signin",
        json!({"email": "a@b.com", "password": "Abcd1234!"}),
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["user_id"].as_str(), Some(user_id.as_str()));

    // The freshly minted access token opens the protected route.
    let access = body["tokens"]["access_token"].as_str().unwrap().to_string();
    let response = client
        .get("/api/v1/me")
        .header(Header::new("Authorization", format!("Bearer {access}")))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let me = response.into_json::<Value>().await.expect("me payload");
    assert_eq!(me["user_id"].as_str(), Some(user_id.as_str()));

    drop(client);
    db.close().await;
}

#[tokio::test]
async fn sign_up_rejects_bad_input_and_duplicates() {
    let db = TestDatabase::new().await.expect("test database");
    let client = auth_client(&db).await;

    let (status, body) = post_json(
        &client,
        "/api/v1/auth/signup",
        json!({"email": "not-an-email", "password": "Abcd1234!"}),
    )
    .await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["error"].as_str(), Some("invalid_email"));

    let (status, body) = post_json(
        &client,
        "/api/v1/auth/signup",
        json!({"email": "a@b.com", "password": "abcd1234"}),
    )
    .await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["error"].as_str(), Some("weak_password"));

    let (status, _) = post_json(
        &client,
        "/api/v1/auth/signup",
        json!({"email": "a@b.com", "password": "Abcd1234!"}),
    )
    .await;
    assert_eq!(status, Status::Created);

    // Case-insensitive duplicate.
    let (status, body) = post_json(
        &client,
        "/api/v1/auth/signup",
        json!({"email": "A@B.COM", "password": "Abcd1234!"}),
    )
    .await;
    assert_eq!(status, Status::Conflict);
    assert_eq!(body["error"].as_str(), Some("email_exists"));

    drop(client);
    db.close().await;
}

#[tokio::test]
async fn repeated_failures_lock_the_account_even_for_the_right_password() {
    let db = TestDatabase::new().await.expect("test database");
    let client = auth_client(&db).await;

    let (status, _) = post_json(
        &client,
        "/api/v1/auth/signup",
        json!({"email": "a@b.com", "password": "Abcd1234!"}),
    )
    .await;
    assert_eq!(status, Status::Created);

    // Five wrong passwords: each answers with the generic credential error;
    // the fifth also arms the lock.
    for _ in 0..5 {
        let (status, body) = post_json(
            &client,
            "/api/v1/auth/signin",
            json!({"email": "a@b.com", "password": "wrong"}),
        )
        .await;
        assert_eq!(status, Status::Unauthorized);
        assert_eq!(body["error"].as_str(), Some("invalid_credentials"));
    }

    // Correct password during the lock window still answers locked.
    let (status, body) = post_json(
        &client,
        "/api/v1/auth/signin",
        json!({"email": "a@b.com", "password": "Abcd1234!"}),
    )
    .await;
    assert_eq!(status, Status::Forbidden);
    assert_eq!(body["error"].as_str(), Some("account_locked"));
    assert!(body["minutes"].as_i64().expect("remaining minutes") >= 1);

    drop(client);
    db.close().await;
}

#[tokio::test]
async fn unknown_email_and_wrong_password_are_indistinguishable() {
    let db = TestDatabase::new().await.expect("test database");
    let client = auth_client(&db).await;

    let (status, body) = post_json(
        &client,
        "/api/v1/auth/signin",
        json!({"email": "nobody@b.com", "password": "Abcd1234!"}),
    )
    .await;
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["error"].as_str(), Some("invalid_credentials"));

    drop(client);
    db.close().await;
}

#[tokio::test]
async fn protected_route_answers_guard_failures_with_error_bodies() {
    let db = TestDatabase::new().await.expect("test database");
    let client = auth_client(&db).await;

    let response = client.get("/api/v1/me").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    let body = response.into_json::<Value>().await.expect("error body");
    assert_eq!(body["error"].as_str(), Some("missing_token"));

    let response = client
        .get("/api/v1/me")
        .header(Header::new("Authorization", "Bearer not-a-real-token"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    let body = response.into_json::<Value>().await.expect("error body");
    assert_eq!(body["error"].as_str(), Some("invalid_token"));

    // An expired token with a valid signature is still just invalid on
    // the wire.
    let expired = JwtService::new("access-secret-for-tests")
        .issue("7ad2cf4b-0f04-4dbd-93a5-bd2c0f0dd7c3", chrono::Duration::seconds(-60))
        .expect("issue expired token");
    let response = client
        .get("/api/v1/me")
        .header(Header::new(
            "Authorization",
            format!("Bearer {}", expired.token),
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    let body = response.into_json::<Value>().await.expect("error body");
    assert_eq!(body["error"].as_str(), Some("invalid_token"));

    drop(client);
    db.close().await;
}

#[tokio::test]
async fn logout_is_idempotent_and_kills_the_refresh_token() {
    let db = TestDatabase::new().await.expect("test database");
    let client = auth_client(&db).await;

    let (status, body) = post_json(
        &client,
        "/api/v1/auth/signup",
        json!({"email": "a@b.com", "password": "Abcd1234!"}),
    )
    .await;
    assert_eq!(status, Status::Created);
    let refresh = body["tokens"]["refresh_token"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let response = client
            .post("/api/v1/auth/logout")
            .header(ContentType::JSON)
            .body(json!({"refresh_token": refresh}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NoContent);
    }

    let (status, body) = post_json(
        &client,
        "/api/v1/auth/refresh",
        json!({"refresh_token": refresh}),
    )
    .await;
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["error"].as_str(), Some("invalid_or_expired"));

    drop(client);
    db.close().await;
}
