#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use edulibrary::{
    AppConfig, AppState, InMemorySessionStore, MockNotifier, MockStorageService, SqliteRepository,
    auth::hash_password,
    create_router,
    models::{NewUser, User},
    repository::Repository,
};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "edulibrary-test-boundary";

/// Fresh, migrated in-memory database. One connection keeps the database alive for
/// the lifetime of the pool.
pub async fn memory_repo() -> Arc<SqliteRepository> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    let repo = SqliteRepository::new(pool);
    repo.migrate().await.expect("Failed to run migrations");
    Arc::new(repo)
}

/// Handles to every service behind the router, for assertions.
pub struct TestContext {
    pub app: Router,
    pub repo: Arc<SqliteRepository>,
    pub storage: Arc<MockStorageService>,
    pub notifier: Arc<MockNotifier>,
    pub sessions: Arc<InMemorySessionStore>,
    pub config: AppConfig,
}

pub async fn context() -> TestContext {
    context_with(
        AppConfig::default(),
        MockStorageService::new(),
        MockNotifier::new(),
    )
    .await
}

pub async fn context_with(
    config: AppConfig,
    storage: MockStorageService,
    notifier: MockNotifier,
) -> TestContext {
    let repo = memory_repo().await;
    let storage = Arc::new(storage);
    let notifier = Arc::new(notifier);
    let sessions = Arc::new(InMemorySessionStore::new());

    let state = AppState {
        repo: repo.clone(),
        storage: storage.clone(),
        sessions: sessions.clone(),
        notifier: notifier.clone(),
        config: config.clone(),
    };

    TestContext {
        app: create_router(state),
        repo,
        storage,
        notifier,
        sessions,
        config,
    }
}

pub async fn seed_user(
    repo: &SqliteRepository,
    username: &str,
    email: &str,
    password: &str,
    is_admin: bool,
) -> User {
    let password_hash = hash_password(password.to_string(), 4)
        .await
        .expect("hash failed");
    repo.create_user(
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            is_admin,
        },
        None,
    )
    .await
    .expect("seed user failed")
    .user
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// A multipart/form-data body with one `pdf` file part plus plain text fields.
pub fn multipart_request(
    uri: &str,
    token: Option<&str>,
    file: Option<(&str, &[u8])>,
    fields: &[(&str, &str)],
) -> Request<Body> {
    let files: Vec<(&str, &[u8])> = file.into_iter().collect();
    multipart_files_request(uri, token, &files, fields)
}

/// Like [`multipart_request`], with any number of `pdf` file parts.
pub fn multipart_files_request(
    uri: &str,
    token: Option<&str>,
    files: &[(&str, &[u8])],
    fields: &[(&str, &str)],
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (filename, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pdf\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

/// A request with a verbatim body and optional content type.
pub fn raw_request(method: Method, uri: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Pulls the session token out of a `Set-Cookie` header.
pub fn session_token(response: &Response<Body>) -> Option<String> {
    let cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let (pair, _) = cookie.split_once(';')?;
    let (_, value) = pair.split_once('=')?;
    (!value.is_empty()).then(|| value.to_string())
}

/// Logs in through the router and returns the session token.
pub async fn login(app: &Router, username: &str, password: &str) -> String {
    let response = send(
        app,
        json_request(
            Method::POST,
            "/login",
            None,
            serde_json::json!({ "username": username, "password": password }),
        ),
    )
    .await;
    assert_eq!(response.status(), 200, "login as {} failed", username);
    session_token(&response).expect("login did not set a session cookie")
}

/// Uploads `name` as the given user and returns the new file's id.
pub async fn upload(ctx: &TestContext, token: &str, name: &str, fields: &[(&str, &str)]) -> i64 {
    let response = send(
        &ctx.app,
        multipart_request("/upload", Some(token), Some((name, b"%PDF-1.4 test".as_slice())), fields),
    )
    .await;
    assert_eq!(response.status(), 200, "upload of {} failed", name);
    let body = body_json(response).await;
    let filename = body["filename"].as_str().unwrap().to_string();

    let files = ctx
        .repo
        .list_files(&Default::default())
        .await
        .unwrap();
    files
        .into_iter()
        .find(|f| f.filename == filename)
        .map(|f| f.id)
        .expect("uploaded file not listed")
}
