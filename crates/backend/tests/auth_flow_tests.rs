//! Login, registration and user API integration tests
mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{
    body_json, create_test_app, create_test_app_with, get_with_bearer, json_request,
    set_cookies, FlakyRepository,
};
use tower::util::ServiceExt;

fn register_body(email: &str, password: &str, repeat: &str) -> serde_json::Value {
    serde_json::json!({
        "name": "Ann Example",
        "email": email,
        "password": password,
        "passwordRepeat": repeat
    })
}

fn login_body(email: &str, password: &str) -> serde_json::Value {
    serde_json::json!({ "email": email, "password": password })
}

#[tokio::test]
async fn test_register_activate_login_and_access() {
    let app = create_test_app();

    // Register: account starts inactive
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            register_body("ann@example.com", "secret1", "secret1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");

    // Inactive login is refused
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            login_body("ann@example.com", "secret1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Account is not active");

    // Activate out of band
    let mut user = app
        .state
        .users
        .get_by_email("ann@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!user.is_active);
    assert!(!user.is_admin);
    user.is_active = true;
    app.state.users.update(user).await.unwrap();

    // Login succeeds and sets both cookies
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            login_body("ann@example.com", "secret1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    let token_cookie = cookies.iter().find(|c| c.starts_with("token=")).unwrap();
    assert!(token_cookie.contains("HttpOnly"));
    assert!(token_cookie.contains("Secure"));
    assert!(token_cookie.contains("SameSite=Strict"));
    assert!(token_cookie.contains("Max-Age=3600"));
    let user_cookie = cookies.iter().find(|c| c.starts_with("user_data=")).unwrap();
    assert!(!user_cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["user"], "Ann Example");
    let token = body["token"].as_str().unwrap().to_string();

    // Token in the cookie reaches protected routes
    let cookie_pair = token_cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, cookie_pair)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "ann@example.com");

    // So does the same token as a bearer
    let response = app
        .router
        .oneshot(get_with_bearer("/api/auth/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_password_mismatch() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            register_body("ann@example.com", "secret1", "secret2"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Passwords do not match");
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = create_test_app();
    app.seed_user("ann@example.com", "secret1", true, false).await;

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            register_body("ann@example.com", "secret1", "secret1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_rejects_invalid_fields() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            register_body("not-an-email", "123", "123"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Validation failed");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = create_test_app();
    app.seed_user("ann@example.com", "secret1", true, false).await;

    let wrong_password = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            login_body("ann@example.com", "secret2"),
        ))
        .await
        .unwrap();
    let unknown_email = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            login_body("bob@example.com", "secret1"),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&wrong_password).is_empty());
    assert_eq!(body_json(wrong_password).await, body_json(unknown_email).await);
}

#[tokio::test]
async fn test_login_storage_failure_is_opaque_500() {
    let repo = Arc::new(FlakyRepository::default());
    let app = create_test_app_with(repo.clone());
    let id = app.seed_user("ann@example.com", "secret1", true, false).await;
    app.state.users.cache().invalidate(id);
    repo.fail_reads.store(true, Ordering::SeqCst);

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            login_body("ann@example.com", "secret1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookies(&response).is_empty());
    let body = body_json(response).await;
    assert_eq!(body["error"], "Internal server error");
    assert!(body.get("details").is_none());
    assert!(!body.to_string().contains("connection reset"));
}

#[tokio::test]
async fn test_logout_clears_cookies() {
    let app = create_test_app();
    let id = app.seed_user("ann@example.com", "secret1", true, false).await;
    let token = app.bearer_for(id, "ann@example.com");

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
}

#[tokio::test]
async fn test_user_api_requires_admin() {
    let app = create_test_app();
    let id = app.seed_user("ann@example.com", "secret1", true, false).await;
    let token = app.bearer_for(id, "ann@example.com");

    let response = app
        .router
        .oneshot(get_with_bearer("/api/users", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_lists_updates_and_deletes_users() {
    let app = create_test_app();
    let admin = app.seed_user("admin@example.com", "secret1", true, true).await;
    let target = app.seed_user("bob@example.com", "secret1", false, false).await;
    let token = app.bearer_for(admin, "admin@example.com");

    let response = app
        .router
        .clone()
        .oneshot(get_with_bearer("/api/users?limit=1&page=1", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["total_count"], 2);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["has_more"], true);
    assert!(page["users"][0].get("password_hash").is_none());

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/api/users/{}", target))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"is_active":true}"#))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["is_active"], true);

    let delete = |uri: String| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    };
    let response = app
        .router
        .clone()
        .oneshot(delete(format!("/api/users/{}", target)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router
        .oneshot(delete(format!("/api/users/{}", target)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
