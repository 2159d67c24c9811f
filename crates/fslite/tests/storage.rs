use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::auth::{Claims, TokenUse, SERVICE_SECRET_HEADER};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use fslite::http_server::router;
use fslite::{ServiceConfig, ServiceState};

const BOUNDARY: &str = "fslite-test-boundary";
const SERVICE_SECRET: &str = "svc-secret";

async fn setup() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = ServiceConfig {
        db_path: Some(temp_dir.path().join("fslite.db")),
        volumes_path: temp_dir.path().join("volumes"),
        service_secret: Some(SERVICE_SECRET.to_string()),
        ..ServiceConfig::default()
    };
    let state = ServiceState::from_config(&config).await.unwrap();
    (router(state), temp_dir)
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
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
    read(app.clone().oneshot(request).await.unwrap()).await
}

async fn upload(
    app: &Router,
    token: &str,
    query: &str,
    filename: &str,
    data: &[u8],
) -> (StatusCode, Value) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/resource/upload?{}", query))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    read(app.clone().oneshot(request).await.unwrap()).await
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/login",
        None,
        Some(json!({"username": "fsladmin", "password": "fsladmin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn new_volume(app: &Router, token: &str, name: &str, capacity: f64) {
    let (status, body) = send(
        app,
        Method::POST,
        "/volume/new",
        Some(token),
        Some(json!({"name": name, "path": format!("/tmp/{}", name), "capacity": capacity})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "volume create failed: {}", body);
    assert_eq!(body["message"], "volume created");
}

/// A token signed with the shared secret for a plain user.
fn user_token(uid: u32, groups: &str) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: uid.to_string(),
        username: "alice".to_string(),
        groups: groups.to_string(),
        group_ids: uid.to_string(),
        iss: "http://localhost:9090".to_string(),
        iat: now,
        exp: now + 600,
        token_use: TokenUse::Access,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"minioth-access"),
    )
    .unwrap()
}

#[tokio::test]
async fn test_upload_and_query_resource() {
    let (app, _tmp) = setup().await;
    let token = admin_token(&app).await;
    new_volume(&app, &token, "v1", 1.0).await;

    let (status, body) = upload(&app, &token, "uid=1000&volume=v1", "hello.txt", b"hello").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "file/s uploaded.");

    let (status, body) = send(&app, Method::GET, "/resource/get?name=hello", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let resources = body.as_array().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0]["name"], "hello.txt");
    assert_eq!(resources[0]["size"], 5);
    assert_eq!(resources[0]["vname"], "v1");
    assert_eq!(resources[0]["uid"], 1000);
    assert_eq!(resources[0]["gid"], 1000);
    assert_eq!(resources[0]["perms"], "rw-r--r--");

    let (status, body) = send(&app, Method::GET, "/volume/get?name=v1", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body[0]["usage"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_upload_over_capacity_is_rejected() {
    let (app, _tmp) = setup().await;
    let token = admin_token(&app).await;
    new_volume(&app, &token, "small", 0.000001).await;

    let data = vec![7u8; 2048];
    let (status, body) = upload(&app, &token, "uid=1000&volume=small", "big.bin", &data).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = send(
        &app,
        Method::GET,
        "/resource/get?name=big&volume=small",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "empty");

    let (_, body) = send(&app, Method::GET, "/volume/get?name=small", Some(&token), None).await;
    assert_eq!(body[0]["usage"].as_f64(), Some(0.0));
}

#[tokio::test]
async fn test_delete_releases_usage() {
    let (app, _tmp) = setup().await;
    let token = admin_token(&app).await;
    new_volume(&app, &token, "v1", 1.0).await;
    upload(&app, &token, "uid=1000&volume=v1", "hello.txt", b"hello").await;

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/resource/delete?name=hello.txt&volume=v1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "v1/hello.txt deleted");

    let (status, body) = send(&app, Method::GET, "/volume/get?name=v1", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["usage"].as_f64(), Some(0.0));

    let (status, _) = send(&app, Method::GET, "/resource/get?name=hello", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_copy_and_download() {
    let (app, _tmp) = setup().await;
    let token = admin_token(&app).await;
    new_volume(&app, &token, "v1", 1.0).await;
    upload(&app, &token, "uid=1000&volume=v1", "hello.txt", b"hello").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/resource/copy?source=v1/hello.txt&dest=v1/copy.txt",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "copy complete");

    let request = Request::builder()
        .uri("/resource/download?resource=v1/copy.txt")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hello");
}

#[tokio::test]
async fn test_download_header_encodes_filename() {
    let (app, _tmp) = setup().await;
    let token = admin_token(&app).await;
    new_volume(&app, &token, "v1", 1.0).await;
    let (status, body) = upload(
        &app,
        &token,
        "uid=1000&volume=v1",
        "q1 report (final).txt",
        b"hi",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let request = Request::builder()
        .uri("/resource/download?resource=v1/q1%20report%20(final).txt")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert_eq!(
        disposition,
        "attachment; filename=\"q1 report (final).txt\"; filename*=UTF-8''q1%20report%20%28final%29.txt"
    );
}

#[tokio::test]
async fn test_requires_token() {
    let (app, _tmp) = setup().await;

    let (status, _) = send(&app, Method::GET, "/volume/get", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/volume/get", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_login_is_unauthorized() {
    let (app, _tmp) = setup().await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({"username": "fsladmin", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_admin_user_is_forbidden() {
    let (app, _tmp) = setup().await;
    let token = user_token(1000, "alice");

    let (status, _) = send(&app, Method::GET, "/volume/get", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = user_token(1001, "bob,admin");
    let (status, body) = send(&app, Method::GET, "/volume/get", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_service_secret_bypasses_tokens() {
    let (app, _tmp) = setup().await;

    let request = Request::builder()
        .uri("/volume/get")
        .header(SERVICE_SECRET_HEADER, SERVICE_SECRET)
        .body(Body::empty())
        .unwrap();
    let (status, body) = read(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v["name"] == "default_ku_space_volume"));

    let request = Request::builder()
        .uri("/volume/get")
        .header(SERVICE_SECRET_HEADER, "guess")
        .body(Body::empty())
        .unwrap();
    let (status, _) = read(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_prefix_and_admin_only_routes() {
    let (app, _tmp) = setup().await;
    let token = admin_token(&app).await;

    let (status, _) = send(&app, Method::GET, "/admin/volume/get", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/admin/system-conf", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locality"], true);
    assert!(body.get("secret_key").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/admin/register",
        Some(&token),
        Some(json!({"username": "ops", "password": "ops-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["message"], "admin registered");

    let (status, _) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({"username": "ops", "password": "ops-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_default_volume_cannot_be_deleted() {
    let (app, _tmp) = setup().await;
    let token = admin_token(&app).await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/volume/delete?name=default_ku_space_volume",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _tmp) = setup().await;

    let (status, _) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/_status/readyz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
