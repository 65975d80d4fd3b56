//! HTTP integration tests for session establishment and the protected routes:
//! cookie writes on /set-cookie, the authenticate/authorize layering on
//! /me, /admin and /validate-token, and session teardown on /logout.

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use async_trait::async_trait;
use authgate::config::AuthConfig;
use authgate::identity::{
    CredentialPair, DirectoryError, IdentityProvider, ProviderError, RoleDirectory,
    StaticRoleDirectory,
};
use authgate::server::{router, AppState};

const SECRET: &str = "integration-test-secret";

fn test_config() -> AuthConfig {
    AuthConfig {
        http_port: 0,
        jwt_secret: SECRET.to_string(),
        allowed_algs: vec![Algorithm::HS256],
        provider_url: "http://provider.invalid".to_string(),
        provider_key: "a.b.c".to_string(),
        provider_timeout: Duration::from_secs(1),
        directory_enabled: false,
        directory_table: "users".to_string(),
        first_party_origins: vec!["https://app.example.com".to_string()],
        cookie_domain: None,
        secure_cookies: true,
        access_ttl_secs: 3600,
        refresh_ttl_secs: 604800,
        refresh_min_interval: Duration::from_secs(60),
    }
}

/// Provider stand-in for routes that never reach the refresh exchange.
struct NoProvider;

#[async_trait]
impl IdentityProvider for NoProvider {
    async fn refresh_credentials(&self, _: &str) -> Result<CredentialPair, ProviderError> {
        Err(ProviderError::Unavailable("not wired in this test".to_string()))
    }
}

/// Directory whose every lookup fails, standing in for an outage.
struct DownDirectory;

#[async_trait]
impl RoleDirectory for DownDirectory {
    async fn role_for(&self, _: &str) -> Result<Option<String>, DirectoryError> {
        Err(DirectoryError("connection refused".to_string()))
    }
}

fn app_with_directory(directory: Arc<dyn RoleDirectory>) -> Router {
    router(AppState::new(test_config(), directory, Arc::new(NoProvider)))
}

fn app() -> Router {
    app_with_directory(Arc::new(StaticRoleDirectory::new()))
}

fn mint(sub: &str, email: &str, offset_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + offset_secs;
    let claims = json!({"sub": sub, "email": email, "exp": exp});
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes()))
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(resp: Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn set_cookies(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn set_cookie_establishes_a_hardened_session() -> Result<()> {
    let token = mint("u1", "a@b.com", 3600);
    // third-party origin: both cookies must go out SameSite=None and Secure
    let mut req = post_json("/set-cookie", json!({"access_token": token, "refresh_token": "r1"}));
    req.headers_mut()
        .insert(header::ORIGIN, "https://other.example.org".parse().unwrap());

    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies = set_cookies(&resp);
    assert_eq!(cookies.len(), 2, "expected both session cookies, got {cookies:?}");
    let access = cookies.iter().find(|c| c.starts_with("authToken=")).expect("access cookie");
    let refresh = cookies.iter().find(|c| c.starts_with("refreshToken=")).expect("refresh cookie");
    for c in [access, refresh] {
        assert!(c.contains("HttpOnly"), "cookie must be HttpOnly: {c}");
        assert!(c.contains("SameSite=None"), "cross-site cookie needs SameSite=None: {c}");
        assert!(c.contains("Secure"), "cross-site cookie needs Secure: {c}");
        assert!(c.contains("Path=/"), "cookie must cover the whole site: {c}");
    }
    assert!(access.contains("Max-Age=3600"), "access ttl wrong: {access}");
    assert!(refresh.contains("Max-Age=604800"), "refresh ttl wrong: {refresh}");

    let body = body_json(resp).await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["email"], json!("a@b.com"));
    assert_eq!(body["role"], json!("Viewer"), "no directory and no metadata defaults to Viewer");
    Ok(())
}

#[tokio::test]
async fn set_cookie_first_party_origin_uses_lax() -> Result<()> {
    let token = mint("u1", "a@b.com", 3600);
    let mut req = post_json("/set-cookie", json!({"access_token": token, "refresh_token": "r1"}));
    req.headers_mut()
        .insert(header::ORIGIN, "https://app.example.com".parse().unwrap());

    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    for c in set_cookies(&resp) {
        assert!(c.contains("SameSite=Lax"), "first-party cookie should be Lax: {c}");
    }
    Ok(())
}

#[tokio::test]
async fn set_cookie_rejects_a_bad_token() -> Result<()> {
    let resp = app()
        .oneshot(post_json("/set-cookie", json!({"access_token": "not-a-jwt"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&resp).is_empty(), "a rejected token must write nothing");

    let body = body_json(resp).await?;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("invalid_token"));
    assert_eq!(body["requiresLogin"], json!(true));
    Ok(())
}

#[tokio::test]
async fn set_cookie_without_refresh_updates_access_only() -> Result<()> {
    let token = mint("u1", "a@b.com", 3600);
    let resp = app()
        .oneshot(post_json("/set-cookie", json!({"access_token": token})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies = set_cookies(&resp);
    assert_eq!(cookies.len(), 1, "silent path must not touch the refresh cookie: {cookies:?}");
    assert!(cookies[0].starts_with("authToken="));
    Ok(())
}

#[tokio::test]
async fn second_set_cookie_within_interval_writes_nothing() -> Result<()> {
    let app = app();
    let token = mint("u1", "a@b.com", 3600);

    let first = app
        .clone()
        .oneshot(post_json("/set-cookie", json!({"access_token": token, "refresh_token": "r1"})))
        .await
        .unwrap();
    assert_eq!(set_cookies(&first).len(), 2);

    let token2 = mint("u1", "a@b.com", 3600);
    let second = app
        .clone()
        .oneshot(post_json("/set-cookie", json!({"access_token": token2, "refresh_token": "r2"})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK, "a suppressed rotation is still a success");
    assert!(
        set_cookies(&second).is_empty(),
        "rotation within the interval must leave the stored cookies alone"
    );
    let body = body_json(second).await?;
    assert_eq!(body["success"], json!(true));
    Ok(())
}

#[tokio::test]
async fn me_without_a_cookie_is_unauthenticated() -> Result<()> {
    let req = Request::builder().uri("/me").body(Body::empty()).unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(resp).await?;
    assert_eq!(body["code"], json!("unauthenticated"));
    assert_eq!(body["requiresLogin"], json!(true));
    Ok(())
}

#[tokio::test]
async fn me_returns_the_resolved_principal() -> Result<()> {
    let app = app_with_directory(Arc::new(StaticRoleDirectory::new().with_role("u1", "Editor")));
    let token = mint("u1", "a@b.com", 3600);
    let resp = app
        .oneshot(get_with_cookie("/me", &format!("authToken={token}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await?;
    assert_eq!(body["user"], json!({"id": "u1", "email": "a@b.com", "role": "Editor"}));
    Ok(())
}

#[tokio::test]
async fn expired_cookie_gets_cleared_with_the_401() -> Result<()> {
    let token = mint("u1", "a@b.com", -600);
    let resp = app()
        .oneshot(get_with_cookie("/me", &format!("authToken={token}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let cookies = set_cookies(&resp);
    for name in ["authToken=", "refreshToken="] {
        let c = cookies
            .iter()
            .find(|c| c.starts_with(name))
            .unwrap_or_else(|| panic!("missing clearing cookie {name} in {cookies:?}"));
        assert!(c.contains("Max-Age=0"), "clearing cookie must expire immediately: {c}");
    }
    let body = body_json(resp).await?;
    assert_eq!(body["code"], json!("unauthenticated"));
    assert_eq!(body["requiresLogin"], json!(true));
    Ok(())
}

#[tokio::test]
async fn directory_outage_is_503_and_keeps_the_session() -> Result<()> {
    let app = app_with_directory(Arc::new(DownDirectory));
    let token = mint("u1", "a@b.com", 3600);
    let resp = app
        .oneshot(get_with_cookie("/me", &format!("authToken={token}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(
        set_cookies(&resp).is_empty(),
        "an outage must not clear a possibly valid session"
    );
    let body = body_json(resp).await?;
    assert_eq!(body["code"], json!("provider_unavailable"));
    assert_eq!(body["requiresLogin"], json!(false), "outage is not the user's fault");
    Ok(())
}

#[tokio::test]
async fn admin_route_separates_401_from_403() -> Result<()> {
    let app = app_with_directory(Arc::new(
        StaticRoleDirectory::new().with_role("ed", "Editor").with_role("ad", "Admin"),
    ));

    // no session at all
    let req = Request::builder().uri("/admin").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // authenticated but under-privileged
    let editor = mint("ed", "ed@b.com", 3600);
    let resp = app
        .clone()
        .oneshot(get_with_cookie("/admin", &format!("authToken={editor}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await?;
    assert_eq!(body["code"], json!("forbidden"));
    assert_eq!(body["requiresLogin"], json!(false), "a 403 must not prompt re-login");

    // sufficient role
    let admin = mint("ad", "ad@b.com", 3600);
    let resp = app
        .oneshot(get_with_cookie("/admin", &format!("authToken={admin}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await?;
    assert_eq!(body["user"]["role"], json!("Admin"));
    Ok(())
}

#[tokio::test]
async fn superadmin_satisfies_the_admin_gate() -> Result<()> {
    let app = app_with_directory(Arc::new(StaticRoleDirectory::new().with_role("sa", "SuperAdmin")));
    let token = mint("sa", "sa@b.com", 3600);
    let resp = app
        .oneshot(get_with_cookie("/admin", &format!("authToken={token}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn validate_token_echoes_the_session() -> Result<()> {
    let app = app_with_directory(Arc::new(StaticRoleDirectory::new().with_role("u1", "Owner")));
    let token = mint("u1", "a@b.com", 3600);
    let req = Request::builder()
        .method("POST")
        .uri("/validate-token")
        .header(header::COOKIE, format!("authToken={token}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await?;
    assert_eq!(body["valid"], json!(true));
    assert_eq!(body["id"], json!("u1"));
    assert_eq!(body["role"], json!("Owner"));
    assert_eq!(body["email"], json!("a@b.com"));
    Ok(())
}

#[tokio::test]
async fn logout_clears_both_cookies_and_repeats_cleanly() -> Result<()> {
    let app = app();
    for _ in 0..2 {
        let req = Request::builder()
            .method("POST")
            .uri("/logout")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let cookies = set_cookies(&resp);
        assert_eq!(cookies.len(), 2, "logout always rewrites both cookies: {cookies:?}");
        for c in &cookies {
            assert!(c.contains("Max-Age=0"), "logout cookie must expire immediately: {c}");
        }
        let body = body_json(resp).await?;
        assert_eq!(body["success"], json!(true));
    }
    Ok(())
}

#[tokio::test]
async fn root_is_reachable_without_a_session() -> Result<()> {
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 1024).await?;
    assert_eq!(&bytes[..], b"authgate ok");
    Ok(())
}
