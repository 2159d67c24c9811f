use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use minioth::http_server::router;
use minioth::{ServiceConfig, ServiceState};

async fn setup() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = ServiceConfig {
        jwks_path: Some(temp_dir.path().join("jwks.json")),
        audit_log: temp_dir.path().join("audit.log"),
        ..ServiceConfig::default()
    };
    let state = ServiceState::from_config(&config).await.unwrap();
    (router(state), temp_dir)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn register(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/v1/register",
        None,
        Some(json!({"user": {"username": username, "password": {"hashpass": password}}})),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/login",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body
}

#[tokio::test]
async fn test_register_login_me() {
    let (app, _tmp) = setup().await;

    let (status, body) = register(&app, "alice", "secret1").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let uid = body["uid"].as_u64().unwrap();
    assert!(uid >= 1000);
    assert_eq!(body["pgroup"].as_u64(), Some(uid));

    let login = login(&app, "alice", "secret1").await;
    assert_eq!(login["user_id"].as_u64(), Some(uid));
    assert_eq!(login["username"], "alice");
    assert!(login["groups"].as_str().unwrap().contains("alice"));
    let token = login["access_token"].as_str().unwrap();

    let (status, me) = send(&app, Method::GET, "/v1/user/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["uid"].as_u64(), Some(uid));
}

#[tokio::test]
async fn test_duplicate_register_conflicts() {
    let (app, _tmp) = setup().await;

    let (status, _) = register(&app, "alice", "secret1").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = register(&app, "alice", "secret2").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let (app, _tmp) = setup().await;

    let (status, _) = register(&app, "root", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = register(&app, "bob", "abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = register(&app, "b!", "secret1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let (app, _tmp) = setup().await;
    register(&app, "alice", "secret1").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/login",
        None,
        Some(json!({"username": "alice", "password": "nope1"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_admin_group() {
    let (app, _tmp) = setup().await;
    register(&app, "alice", "secret1").await;

    let (status, _) = send(&app, Method::GET, "/v1/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let alice = login(&app, "alice", "secret1").await;
    let token = alice["access_token"].as_str().unwrap();
    let (status, _) = send(&app, Method::GET, "/v1/admin/users", Some(token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let root = login(&app, "root", "root").await;
    let token = root["access_token"].as_str().unwrap();
    let (status, body) = send(&app, Method::GET, "/v1/admin/users", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["content"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|u| u["username"].as_str())
        .collect();
    assert!(names.contains(&"root"));
    assert!(names.contains(&"alice"));
}

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let (app, _tmp) = setup().await;
    register(&app, "alice", "secret1").await;
    let login = login(&app, "alice", "secret1").await;

    // an access token is not a refresh token
    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/token/refresh",
        None,
        Some(json!({"refresh_token": login["access_token"]})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/token/refresh",
        None,
        Some(json!({"refresh_token": login["refresh_token"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let fresh = body["access_token"].as_str().unwrap();

    let (status, me) = send(&app, Method::GET, "/v1/user/me", Some(fresh), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");

    // refresh tokens are not accepted by the gate
    let refresh = login["refresh_token"].as_str().unwrap();
    let (status, _) = send(&app, Method::GET, "/v1/user/me", Some(refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_passwd_only_for_self_or_admin() {
    let (app, _tmp) = setup().await;
    register(&app, "alice", "secret1").await;
    register(&app, "bob", "secret1").await;
    let alice = login(&app, "alice", "secret1").await;
    let token = alice["access_token"].as_str().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/passwd",
        Some(token),
        Some(json!({"username": "bob", "password": "stolen1"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/passwd",
        Some(token),
        Some(json!({"password": "changed1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login(&app, "alice", "changed1").await;
}

#[tokio::test]
async fn test_rotation_keeps_old_tokens_valid() {
    let (app, _tmp) = setup().await;

    let (status, jwks) = send(&app, Method::GET, "/.well-known/jwks.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jwks["keys"].as_array().unwrap().len(), 1);

    // an RS256 token signed by the first key
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Auth-Signing-Alg", "RS256")
        .body(Body::from(json!({"username": "root", "password": "root"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let login: Value = serde_json::from_slice(&bytes).unwrap();
    let old_token = login["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::POST, "/v1/admin/rotate", Some(&old_token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["kid"].as_str().is_some());

    let (_, jwks) = send(&app, Method::GET, "/.well-known/jwks.json", None, None).await;
    assert_eq!(jwks["keys"].as_array().unwrap().len(), 2);
    let (_, v1_jwks) = send(&app, Method::GET, "/v1/.well-known/jwks.json", None, None).await;
    assert_eq!(v1_jwks, jwks);

    let (status, info) = send(&app, Method::GET, "/v1/user/token", Some(&old_token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", info);
    assert_eq!(info["info"]["valid"], true);
    assert_eq!(info["info"]["username"], "root");
}

#[tokio::test]
async fn test_discovery_and_health() {
    let (app, _tmp) = setup().await;

    let (status, doc) = send(
        &app,
        Method::GET,
        "/.well-known/openid-configuration",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["issuer"], "http://localhost:9090");
    assert_eq!(doc["jwks_uri"], "http://localhost:9090/.well-known/jwks.json");

    let (status, _) = send(&app, Method::GET, "/_status/readyz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
