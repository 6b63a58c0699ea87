//! Router-level behavior: status codes, bodies and cookies.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

use crate::e2e_tests::helpers::*;
use crate::http::cookies::{ACCESS_COOKIE, REFRESH_COOKIE};

#[tokio::test]
async fn test_liveness() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(request("GET", "/", &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_sets_cookies_and_hides_password() {
    let h = Harness::new();
    let body = json!({"name": "Alice", "email": "alice@example.com", "password": "wonderland"});

    let response = h
        .router()
        .oneshot(post_json("/api/users/register", &body, &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookies = set_cookies(&response);
    let access = cookies
        .iter()
        .find(|c| c.starts_with("accessToken="))
        .expect("access cookie");
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("SameSite=Lax"));
    assert!(access.contains("Path=/"));
    assert!(access.contains("Max-Age=900"));
    assert!(!access.contains("Secure"));
    assert!(cookie_value(&response, REFRESH_COOKIE).is_some_and(|v| !v.is_empty()));

    let json = json_body(response).await;
    assert_eq!(json["message"], "User created successfully");
    assert_eq!(json["source"], "primary");
    assert_eq!(json["user"]["email"], "alice@example.com");
    assert_eq!(json["user"]["name"], "Alice");
    assert!(json["user"].get("password").is_none());
    assert!(json["user"].get("password_hash").is_none());
    assert_eq!(h.primary.len(), 1);
    assert_eq!(h.ledger.refresh_count(), 1);
}

#[tokio::test]
async fn test_register_missing_fields_is_bad_request() {
    let h = Harness::new();
    let body = json!({"email": "alice@example.com"});
    let response = h
        .router()
        .oneshot(post_json("/api/users/register", &body, &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "Missing required fields");
}

#[tokio::test]
async fn test_register_null_field_is_bad_request() {
    let h = Harness::new();
    let body = json!({"name": null, "email": "alice@example.com", "password": "pw"});
    let response = h
        .router()
        .oneshot(post_json("/api/users/register", &body, &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());
    assert_eq!(json_body(response).await["message"], "Missing required fields");
    assert!(h.primary.is_empty());
}

#[tokio::test]
async fn test_register_mistyped_field_is_bad_request() {
    let h = Harness::new();
    let body = json!({"name": 42, "email": "alice@example.com", "password": "pw"});
    let response = h
        .router()
        .oneshot(post_json("/api/users/register", &body, &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "Missing required fields");
}

#[tokio::test]
async fn test_login_without_content_type_is_bad_request() {
    let h = Harness::new();
    h.service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");

    let body = json!({"email": "alice@example.com", "password": "pw"});
    let request = Request::post("/api/users/login")
        .body(Body::from(body.to_string()))
        .expect("request");
    let response = h.router().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());
    assert_eq!(json_body(response).await["message"], "Missing required fields");
}

#[tokio::test]
async fn test_login_malformed_json_is_bad_request() {
    let h = Harness::new();
    let request = Request::post("/api/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\": "))
        .expect("request");
    let response = h.router().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "Missing required fields");
}

#[tokio::test]
async fn test_register_with_external_store_down_is_503() {
    let h = Harness::new();
    h.candidates.set_reachable(false);
    let body = json!({"name": "Alice", "email": "alice@example.com", "password": "pw"});
    let response = h
        .router()
        .oneshot(post_json("/api/users/register", &body, &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_login_external_reports_source() {
    let h = Harness::new();
    h.seed_candidate("Bob", "bob@example.com", Some("builder"));
    let body = json!({"email": "bob@example.com", "password": "builder"});

    let response = h
        .router()
        .oneshot(post_json("/api/users/login", &body, &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_value(&response, ACCESS_COOKIE).is_some());

    let json = json_body(response).await;
    assert_eq!(json["message"], "Login successful");
    assert_eq!(json["source"], "external");
    assert_eq!(json["user"]["name"], "Bob");
}

#[tokio::test]
async fn test_login_wrong_password_is_generic() {
    let h = Harness::new();
    h.seed_candidate("Bob", "bob@example.com", Some("builder"));
    let body = json!({"email": "bob@example.com", "password": "wrong"});

    let response = h
        .router()
        .oneshot(post_json("/api/users/login", &body, &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_refresh_rotates_cookies() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let old = session.tokens.refresh.token;

    let response = h
        .router()
        .oneshot(request(
            "POST",
            "/api/users/refresh-token",
            &[(REFRESH_COOKIE, old.as_str())],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let new_refresh = cookie_value(&response, REFRESH_COOKIE).expect("refresh cookie");
    assert_ne!(new_refresh, old);
    assert!(cookie_value(&response, ACCESS_COOKIE).is_some_and(|v| !v.is_empty()));
    assert_eq!(json_body(response).await["source"], "primary");
}

#[tokio::test]
async fn test_refresh_blacklisted_clears_cookies() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let token = session.tokens.refresh.token;
    h.service.ledger().blacklist(&token).await.expect("blacklist");

    let response = h
        .router()
        .oneshot(request(
            "POST",
            "/api/users/refresh-token",
            &[(REFRESH_COOKIE, token.as_str())],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(cookie_value(&response, ACCESS_COOKIE).as_deref(), Some(""));
    assert_eq!(cookie_value(&response, REFRESH_COOKIE).as_deref(), Some(""));
    assert_eq!(
        json_body(response).await["message"],
        "Token has been invalidated. Please login again."
    );
}

#[tokio::test]
async fn test_refresh_without_cookie_is_unauthorized() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(request("POST", "/api/users/refresh-token", &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(cookie_value(&response, REFRESH_COOKIE).as_deref(), Some(""));
}

#[tokio::test]
async fn test_logout_clears_cookies_even_when_ledger_fails() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    h.ledger.set_failing(true);

    let response = h
        .router()
        .oneshot(request(
            "POST",
            "/api/users/logout",
            &[
                (ACCESS_COOKIE, session.tokens.access.token.as_str()),
                (REFRESH_COOKIE, session.tokens.refresh.token.as_str()),
            ],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        let cleared = cookies
            .iter()
            .find(|c| c.starts_with(&format!("{name}=")))
            .expect("cleared cookie");
        assert!(cleared.starts_with(&format!("{name}=;")));
        assert!(cleared.contains("Max-Age=0"));
    }
    assert_eq!(json_body(response).await["message"], "Logout successful");
}

#[tokio::test]
async fn test_logout_without_cookies_succeeds() {
    let h = Harness::new();
    let response = h
        .router()
        .oneshot(request("POST", "/api/users/logout", &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookies(&response).len(), 2);
}

#[tokio::test]
async fn test_user_data_with_cookie() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");

    let response = h
        .router()
        .oneshot(request(
            "GET",
            "/api/users/data",
            &[(ACCESS_COOKIE, session.tokens.access.token.as_str())],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["user"]["id"], session.principal.id.as_str());
    assert_eq!(json["source"], "primary");
}

#[tokio::test]
async fn test_user_data_with_bearer_header() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");

    let mut req = request("GET", "/api/users/data", &[]);
    let bearer = format!("Bearer {}", session.tokens.access.token);
    req.headers_mut()
        .insert(header::AUTHORIZATION, bearer.parse().expect("header"));

    let response = h.router().oneshot(req).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_user_data_rejections() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");

    // No token.
    let response = h
        .router()
        .oneshot(request("GET", "/api/users/data", &[]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A refresh token in the access cookie.
    let response = h
        .router()
        .oneshot(request(
            "GET",
            "/api/users/data",
            &[(ACCESS_COOKIE, session.tokens.refresh.token.as_str())],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Expired access token.
    h.expire_access();
    let response = h
        .router()
        .oneshot(request(
            "GET",
            "/api/users/data",
            &[(ACCESS_COOKIE, session.tokens.access.token.as_str())],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_data_after_logout_is_unauthorized() {
    let h = Harness::new();
    let session = h
        .service
        .register("Alice", "alice@example.com", "pw")
        .await
        .expect("register");
    let access = session.tokens.access.token;
    h.service.logout(Some(&access), None).await;

    let response = h
        .router()
        .oneshot(request(
            "GET",
            "/api/users/data",
            &[(ACCESS_COOKIE, access.as_str())],
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
