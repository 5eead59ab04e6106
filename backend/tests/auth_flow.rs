use axum::http::StatusCode;
use ironclub_backend::services::auth::{
    ALREADY_VERIFIED_MESSAGE, EMAIL_NOT_VERIFIED_MESSAGE, INVALID_CREDENTIALS_MESSAGE,
};
use serde_json::json;

mod support;
use support::{TestApp, PASSWORD};

#[tokio::test]
async fn register_creates_user_without_profile_and_sends_verification() {
    let app = TestApp::new();

    let response = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({
                "name": "Lucy Charles",
                "email": "Lucy@Example.com",
                "password": PASSWORD,
                "password_confirmation": PASSWORD,
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let json = response.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["user"]["email"], "lucy@example.com");
    assert_eq!(json["data"]["user"]["verified"], false);
    assert!(json["data"]["user"].get("password_hash").is_none());
    assert_eq!(json["data"]["token"].as_str().map(str::len), Some(40));

    assert_eq!(app.db.user_count(), 1);
    assert_eq!(app.db.profile_count(), 0);
    assert_eq!(app.notifier.count("verify_email"), 1);
}

#[tokio::test]
async fn register_rejects_duplicate_email_case_insensitively() {
    let app = TestApp::new();
    app.register("Jan", "jan@example.com").await;

    let response = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({
                "name": "Impostor",
                "email": "JAN@example.com",
                "password": PASSWORD,
                "password_confirmation": PASSWORD,
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.json()["errors"]["email"][0],
        "The email has already been taken."
    );
    assert_eq!(app.db.user_count(), 1);
}

#[tokio::test]
async fn register_reports_field_errors() {
    let app = TestApp::new();

    let response = app
        .post(
            "/api/v1/auth/register",
            None,
            json!({
                "name": "",
                "email": "not-an-email",
                "password": "short",
                "password_confirmation": "different",
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let json = response.json();
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"]["name"][0], "The name field is required.");
    assert_eq!(
        json["errors"]["email"][0],
        "The email field must be a valid email address."
    );
    assert!(json["errors"]["password"].is_array());
    assert_eq!(app.db.user_count(), 0);
}

#[tokio::test]
async fn malformed_json_body_is_a_validation_error() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/auth/register")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.json()["errors"]["body"].is_array());
}

#[tokio::test]
async fn unverified_login_succeeds_with_advisory_flag() {
    let app = TestApp::new();
    app.register("Jan", "jan@example.com").await;

    let response = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({"email": "jan@example.com", "password": PASSWORD}),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["email_not_verified"], true);
    assert_eq!(json["message"], EMAIL_NOT_VERIFIED_MESSAGE);
    assert!(json["data"]["token"].is_string());
}

#[tokio::test]
async fn verified_login_has_no_advisory_flag() {
    let app = TestApp::new();
    app.register_verified("Jan", "jan@example.com").await;

    let response = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({"email": "jan@example.com", "password": PASSWORD}),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert!(json.get("email_not_verified").is_none());
    assert_eq!(json["data"]["user"]["verified"], true);
}

#[tokio::test]
async fn second_login_leaves_exactly_one_session() {
    let app = TestApp::new();
    let account = app.register("Jan", "jan@example.com").await;
    let credentials = json!({"email": "jan@example.com", "password": PASSWORD});

    let first = app.post("/api/v1/auth/login", None, credentials.clone()).await;
    let first_token = first.json()["data"]["token"].as_str().unwrap().to_string();
    let second = app.post("/api/v1/auth/login", None, credentials).await;
    let second_token = second.json()["data"]["token"].as_str().unwrap().to_string();

    assert_eq!(app.db.sessions_for(account.id), 1);
    assert_eq!(
        app.get("/api/v1/auth/user", Some(&first_token)).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/api/v1/auth/user", Some(&account.token)).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/api/v1/auth/user", Some(&second_token)).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = TestApp::new();
    app.register("Jan", "jan@example.com").await;

    let wrong_password = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({"email": "jan@example.com", "password": "not-the-password"}),
        )
        .await;
    let unknown_email = app
        .post(
            "/api/v1/auth/login",
            None,
            json!({"email": "nobody@example.com", "password": PASSWORD}),
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.json(), unknown_email.json());
    assert_eq!(
        wrong_password.json()["errors"]["email"][0],
        INVALID_CREDENTIALS_MESSAGE
    );
}

#[tokio::test]
async fn login_requires_both_fields() {
    let app = TestApp::new();

    let response = app.post("/api/v1/auth/login", None, json!({})).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    let json = response.json();
    assert!(json["errors"]["email"].is_array());
    assert!(json["errors"]["password"].is_array());
}

#[tokio::test]
async fn current_user_requires_a_bearer_token() {
    let app = TestApp::new();

    let response = app.get("/api/v1/auth/user", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["errors"]["auth"][0], "Unauthenticated.");

    let response = app.get("/api/v1/auth/user", Some("made-up-token")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn current_user_returns_public_fields() {
    let app = TestApp::new();
    let account = app.register("Jan", "jan@example.com").await;

    let response = app.get("/api/v1/auth/user", Some(&account.token)).await;

    assert_eq!(response.status, StatusCode::OK);
    let data = &response.json()["data"];
    assert_eq!(data["id"], account.id.to_string());
    assert_eq!(data["name"], "Jan");
    assert_eq!(data["email"], "jan@example.com");
    assert_eq!(data["verified"], false);
}

#[tokio::test]
async fn logout_revokes_only_the_presented_token() {
    let app = TestApp::new();
    let account = app.register("Jan", "jan@example.com").await;

    let response = app
        .call(
            axum::http::Method::POST,
            "/api/v1/auth/logout",
            Some(&account.token),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["message"], "Logged out successfully.");
    assert_eq!(app.db.sessions_for(account.id), 0);
    assert_eq!(
        app.get("/api/v1/auth/user", Some(&account.token)).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn logout_without_token_is_unauthorized() {
    let app = TestApp::new();

    let response = app
        .call(axum::http::Method::POST, "/api/v1/auth/logout", None, None)
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn resend_verification_until_verified() {
    let app = TestApp::new();
    let account = app.register("Jan", "jan@example.com").await;

    let response = app
        .call(
            axum::http::Method::POST,
            "/api/v1/auth/email/resend-verification",
            Some(&account.token),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.notifier.count("verify_email"), 2);

    assert_eq!(app.follow_verification_link().await.status, StatusCode::OK);

    let response = app
        .call(
            axum::http::Method::POST,
            "/api/v1/auth/email/resend-verification",
            Some(&account.token),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json()["errors"]["email"][0], ALREADY_VERIFIED_MESSAGE);
    assert_eq!(app.notifier.count("verify_email"), 2);
}
