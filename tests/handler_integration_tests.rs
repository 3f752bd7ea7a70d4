use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use news_portal::{
    AppConfig, AppState, InMemoryRepository, LocalDiskStorage, MockStorageService,
    create_router,
    models::{CreatedResponse, MessageResponse, NewsPost, TokenResponse},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt;

const BOUNDARY: &str = "news-portal-test-boundary";

// --- Helper Functions ---

fn app_with(repo: InMemoryRepository, storage: MockStorageService) -> Router {
    let config = AppConfig {
        jwt_secret: "handler-test-secret".to_string(),
        ..AppConfig::default()
    };
    create_router(AppState::new(config, Arc::new(repo), Arc::new(storage)))
}

fn app() -> Router {
    app_with(InMemoryRepository::new(), MockStorageService::new())
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Builds a multipart/form-data body with text fields and an optional file part.
fn multipart_request(token: Option<&str>, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/news")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

async fn register_and_login(app: &Router, username: &str) -> String {
    let creds = json!({ "username": username, "password": "pw-123" });
    let response = send(app, json_request("POST", "/api/register", None, creds.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(app, json_request("POST", "/api/login", None, creds)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json::<TokenResponse>(response).await.token
}

async fn create_post(app: &Router, token: &str, title: &str) -> i64 {
    let response = send(
        app,
        multipart_request(Some(token), &[("title", title), ("content", "body")], None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json::<CreatedResponse>(response).await.id
}

// --- Tests ---

#[tokio::test]
async fn health_check() {
    let response = send(&app(), empty_request("GET", "/health", None)).await;
    assert!(response.status().is_success());
}

#[tokio::test]
async fn register_validates_and_detects_duplicates() {
    let app = app();

    let response = send(
        &app,
        json_request("POST", "/api/register", None, json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: MessageResponse = body_json(response).await;
    assert!(!body.message.is_empty());

    let creds = json!({ "username": "alice", "password": "pw" });
    let response = send(&app, json_request("POST", "/api/register", None, creds.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, json_request("POST", "/api/register", None, creds)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_json_is_a_400_with_a_message() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = send(&app(), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: MessageResponse = body_json(response).await;
    assert!(!body.message.is_empty());
}

#[tokio::test]
async fn login_failures_share_one_shape() {
    let app = app();
    register_and_login(&app, "alice").await;

    let wrong = send(
        &app,
        json_request("POST", "/api/login", None, json!({ "username": "alice", "password": "bad" })),
    )
    .await;
    let unknown = send(
        &app,
        json_request("POST", "/api/login", None, json!({ "username": "ghost", "password": "pw-123" })),
    )
    .await;

    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let wrong: MessageResponse = body_json(wrong).await;
    let unknown: MessageResponse = body_json(unknown).await;
    assert_eq!(wrong.message, unknown.message);
}

#[tokio::test]
async fn mutations_require_a_token() {
    let app = app();

    let response = send(&app, multipart_request(None, &[("title", "t"), ("content", "c")], None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: MessageResponse = body_json(response).await;
    assert!(!body.message.is_empty());

    let response = send(
        &app,
        json_request("PUT", "/api/news/1", Some("garbage"), json!({ "title": "t", "content": "c" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, empty_request("DELETE", "/api/news/1", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn news_lifecycle() {
    let app = app();
    let token = register_and_login(&app, "alice").await;

    // Create
    let id = create_post(&app, &token, "Launch").await;

    // Read
    let response = send(&app, empty_request("GET", &format!("/api/news/{id}"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let news: NewsPost = body_json(response).await;
    assert_eq!(news.title, "Launch");
    assert_eq!(news.content, "body");
    assert_eq!(news.author, "alice");
    assert_eq!(news.image_url, None);

    // Update
    let response = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/news/{id}"),
            Some(&token),
            json!({ "title": "Launch v2", "content": "new body" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request("GET", &format!("/api/news/{id}"), None)).await;
    let news: NewsPost = body_json(response).await;
    assert_eq!(news.title, "Launch v2");
    assert_eq!(news.content, "new body");

    // Delete
    let response = send(&app, empty_request("DELETE", &format!("/api/news/{id}"), Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty_request("GET", &format!("/api/news/{id}"), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: MessageResponse = body_json(response).await;
    assert!(!body.message.is_empty());
}

#[tokio::test]
async fn non_owner_gets_403_and_post_survives() {
    let app = app();
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;
    let id = create_post(&app, &alice, "Alice's").await;

    let response = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/news/{id}"),
            Some(&bob),
            json!({ "title": "Bob's now", "content": "x" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, empty_request("DELETE", &format!("/api/news/{id}"), Some(&bob))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Missing posts answer the same way.
    let response = send(&app, empty_request("DELETE", "/api/news/999999", Some(&bob))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, empty_request("GET", &format!("/api/news/{id}"), None)).await;
    let news: NewsPost = body_json(response).await;
    assert_eq!(news.title, "Alice's");
}

#[tokio::test]
async fn create_validates_fields() {
    let app = app();
    let token = register_and_login(&app, "alice").await;

    let response = send(&app, multipart_request(Some(&token), &[("title", "only title")], None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = json_request("POST", "/api/news", Some(&token), json!({ "title": "t", "content": "c" }));
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_with_image_stores_it_under_a_generated_name() {
    let storage = MockStorageService::new();
    let app = app_with(InMemoryRepository::new(), storage.clone());
    let token = register_and_login(&app, "alice").await;

    let response = send(
        &app,
        multipart_request(
            Some(&token),
            &[("title", "Pic"), ("content", "See image")],
            Some(("holiday.jpg", b"jpeg-bytes".as_slice())),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let created: CreatedResponse = body_json(response).await;

    let response = send(&app, empty_request("GET", &format!("/api/news/{}", created.id), None)).await;
    let news: NewsPost = body_json(response).await;
    let url = news.image_url.expect("image url");
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with(".jpg"));
    assert!(!url.contains("holiday"));

    let saved = storage.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, url);
    assert_eq!(&saved[0].1[..], b"jpeg-bytes");
}

#[tokio::test]
async fn storage_failure_is_a_generic_500() {
    let app = app_with(InMemoryRepository::new(), MockStorageService::new_failing());
    let token = register_and_login(&app, "alice").await;

    let response = send(
        &app,
        multipart_request(
            Some(&token),
            &[("title", "Pic"), ("content", "x")],
            Some(("a.png", b"png".as_slice())),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: MessageResponse = body_json(response).await;
    assert_eq!(body.message, "Internal server error");
}

#[tokio::test]
async fn list_filters_by_author_and_validates_date() {
    let app = app();
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;
    create_post(&app, &alice, "A").await;
    create_post(&app, &bob, "B").await;
    let newest = create_post(&app, &alice, "A2").await;

    let response = send(&app, empty_request("GET", "/api/news", None)).await;
    let all: Vec<NewsPost> = body_json(response).await;
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, newest);

    let response = send(&app, empty_request("GET", "/api/news?author=alice", None)).await;
    let mine: Vec<NewsPost> = body_json(response).await;
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|p| p.author == "alice"));

    let response = send(&app, empty_request("GET", "/api/news?date=2000-01-01", None)).await;
    let old: Vec<NewsPost> = body_json(response).await;
    assert!(old.is_empty());

    let response = send(&app, empty_request("GET", "/api/news?date=not-a-date", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_numeric_id_is_not_found() {
    let response = send(&app(), empty_request("GET", "/api/news/abc", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: MessageResponse = body_json(response).await;
    assert!(!body.message.is_empty());
}

#[tokio::test]
async fn refresh_issues_a_working_token() {
    let app = app();
    let token = register_and_login(&app, "alice").await;

    let response = send(&app, empty_request("POST", "/api/refresh", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed: TokenResponse = body_json(response).await;

    create_post(&app, &refreshed.token, "After refresh").await;

    let response = send(&app, empty_request("POST", "/api/refresh", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn store_failure_is_a_generic_500() {
    let app = app_with(InMemoryRepository::new_failing(), MockStorageService::new());

    let response = send(&app, empty_request("GET", "/api/news", None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: MessageResponse = body_json(response).await;
    assert_eq!(body.message, "Internal server error");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let response = send(&app(), empty_request("GET", "/health", None)).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn uploaded_image_is_served_at_its_recorded_url() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        jwt_secret: "handler-test-secret".to_string(),
        upload_dir: dir.path().to_path_buf(),
        ..AppConfig::default()
    };
    let storage = LocalDiskStorage::new(dir.path());
    let app = create_router(AppState::new(
        config,
        Arc::new(InMemoryRepository::new()),
        Arc::new(storage),
    ));
    let token = register_and_login(&app, "alice").await;

    let response = send(
        &app,
        multipart_request(
            Some(&token),
            &[("title", "Pic"), ("content", "See image")],
            Some(("photo.png", b"PNGDATA".as_slice())),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let created: CreatedResponse = body_json(response).await;

    let response = send(&app, empty_request("GET", &format!("/api/news/{}", created.id), None)).await;
    let news: NewsPost = body_json(response).await;
    let url = news.image_url.expect("image url");

    let response = send(&app, empty_request("GET", &url, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"PNGDATA");
}

#[tokio::test]
async fn unsupported_method_needs_a_token_before_405() {
    let app = app();
    let token = register_and_login(&app, "alice").await;

    let response = send(&app, empty_request("PATCH", "/api/news", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, empty_request("PATCH", "/api/news", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn update_with_blank_title_is_a_400() {
    let app = app();
    let token = register_and_login(&app, "alice").await;
    let id = create_post(&app, &token, "Original").await;

    let response = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/news/{id}"),
            Some(&token),
            json!({ "title": "   ", "content": "still here" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, empty_request("GET", &format!("/api/news/{id}"), None)).await;
    let news: NewsPost = body_json(response).await;
    assert_eq!(news.title, "Original");
}
