use super::*;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response as AxumResponse},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::domain::FileLocator;
use tokio::{net::TcpListener, sync::Mutex};

const PASSWORD: &str = "hunter2";
const SESSION_COOKIE: &str = "session=authenticated";

#[derive(Clone, Default)]
struct ServerState {
    list_queries: Arc<Mutex<Vec<Option<String>>>>,
    requested_with: Arc<Mutex<Vec<Option<String>>>>,
    create_bodies: Arc<Mutex<Vec<Value>>>,
    deliver_bodies: Arc<Mutex<Vec<Value>>>,
    download_bodies: Arc<Mutex<Vec<Value>>>,
}

#[derive(Deserialize)]
struct LocationQuery {
    location: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    password: String,
}

fn has_session(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|cookies| cookies.contains(SESSION_COOKIE))
}

fn unauthorized() -> AxumResponse {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response()
}

async fn handle_login(Form(form): Form<LoginForm>) -> AxumResponse {
    if form.password == PASSWORD {
        (
            StatusCode::FOUND,
            [
                (header::LOCATION, "/".to_string()),
                (header::SET_COOKIE, format!("{SESSION_COOKIE}; Path=/")),
            ],
        )
            .into_response()
    } else {
        (StatusCode::OK, "<form>Invalid password</form>").into_response()
    }
}

async fn handle_list(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<LocationQuery>,
) -> AxumResponse {
    state.requested_with.lock().await.push(
        headers
            .get("x-requested-with")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    );
    if !has_session(&headers) {
        return unauthorized();
    }
    if query.location.as_deref() == Some("feed") {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "Rate limited. Please wait a moment and try again."})),
        )
            .into_response();
    }
    state.list_queries.lock().await.push(query.location);
    Json(json!({
        "articles": [
            {
                "id": "a1",
                "title": "First",
                "author": "Ada",
                "word_count": 300,
                "location": "later",
                "created_at": "2024-03-02T09:00:00+00:00"
            },
            {
                "id": "a2",
                "title": "Second",
                "word_count": 150,
                "location": "later",
                "created_at": "2024-03-01T09:00:00+00:00"
            }
        ]
    }))
    .into_response()
}

async fn handle_create(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> AxumResponse {
    if !has_session(&headers) {
        return unauthorized();
    }
    let count = body["article_ids"].as_array().map(Vec::len).unwrap_or(0);
    state.create_bodies.lock().await.push(body);
    Json(json!({
        "success": true,
        "filepath": "/tmp/R2K-20240302.epub",
        "filename": "R2K-20240302.epub",
        "digest_title": "R2K - 20240302",
        "article_count": count
    }))
    .into_response()
}

async fn handle_deliver(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> AxumResponse {
    if !has_session(&headers) {
        return unauthorized();
    }
    state.deliver_bodies.lock().await.push(body);
    (StatusCode::BAD_REQUEST, "not json").into_response()
}

async fn handle_download(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> AxumResponse {
    if !has_session(&headers) {
        return (StatusCode::FOUND, [(header::LOCATION, "/login")]).into_response();
    }
    state.download_bodies.lock().await.push(body);
    (StatusCode::OK, b"PK\x03\x04epub-bytes".to_vec()).into_response()
}

async fn spawn_reader_server() -> anyhow::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/login", post(handle_login))
        .route("/api/articles", get(handle_list))
        .route("/api/create-epub", post(handle_create))
        .route("/api/send-to-kindle", post(handle_deliver))
        .route("/api/download-epub", post(handle_download))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn backend(server_url: &str) -> HttpReaderBackend {
    HttpReaderBackend::new(server_url, Duration::from_secs(5)).expect("backend")
}

fn sample_bundle() -> BundleRef {
    BundleRef {
        locator: FileLocator::from("/tmp/R2K-20240302.epub"),
        filename: "R2K-20240302.epub".to_string(),
        article_count: 2,
        digest_title: Some("R2K - 20240302".to_string()),
    }
}

#[tokio::test]
async fn unauthenticated_listing_is_an_auth_challenge() {
    let (server_url, state) = spawn_reader_server().await.expect("spawn server");
    let backend = backend(&server_url);

    let err = backend.list_articles(None).await.expect_err("must challenge");
    assert_eq!(err, BackendError::AuthRequired);

    let requested_with = state.requested_with.lock().await.clone();
    assert_eq!(requested_with, vec![Some("XMLHttpRequest".to_string())]);
}

#[tokio::test]
async fn login_keeps_session_cookie_for_later_calls() {
    let (server_url, state) = spawn_reader_server().await.expect("spawn server");
    let backend = backend(&server_url);

    backend.login(PASSWORD).await.expect("login");
    let articles = backend.list_articles(Some("later")).await.expect("list");

    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].id, ArticleId::from("a1"));
    assert_eq!(articles[0].author.as_deref(), Some("Ada"));
    assert_eq!(
        *state.list_queries.lock().await,
        vec![Some("later".to_string())]
    );
}

#[tokio::test]
async fn listing_without_location_sends_no_query() {
    let (server_url, state) = spawn_reader_server().await.expect("spawn server");
    let backend = backend(&server_url);
    backend.login(PASSWORD).await.expect("login");

    backend.list_articles(None).await.expect("list");
    assert_eq!(*state.list_queries.lock().await, vec![None]);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let (server_url, _state) = spawn_reader_server().await.expect("spawn server");
    let backend = backend(&server_url);

    let err = backend.login("nope").await.expect_err("must fail");
    assert!(err.to_string().contains("invalid password"), "{err}");
}

#[tokio::test]
async fn server_error_message_is_propagated() {
    let (server_url, _state) = spawn_reader_server().await.expect("spawn server");
    let backend = backend(&server_url);
    backend.login(PASSWORD).await.expect("login");

    let err = backend.list_articles(Some("feed")).await.expect_err("must fail");
    assert_eq!(
        err,
        BackendError::Rejected {
            status: 429,
            message: Some("Rate limited. Please wait a moment and try again.".to_string()),
        }
    );
}

#[tokio::test]
async fn create_bundle_posts_selected_ids() {
    let (server_url, state) = spawn_reader_server().await.expect("spawn server");
    let backend = backend(&server_url);
    backend.login(PASSWORD).await.expect("login");

    let bundle = backend
        .create_bundle(&[ArticleId::from("a1"), ArticleId::from("a2")])
        .await
        .expect("create");

    assert_eq!(bundle.filename, "R2K-20240302.epub");
    assert_eq!(bundle.article_count, 2);
    assert_eq!(
        state.create_bodies.lock().await[0],
        json!({"article_ids": ["a1", "a2"]})
    );
}

#[tokio::test]
async fn non_json_error_body_has_no_message() {
    let (server_url, state) = spawn_reader_server().await.expect("spawn server");
    let backend = backend(&server_url);
    backend.login(PASSWORD).await.expect("login");

    let err = backend
        .deliver_bundle(&sample_bundle())
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        BackendError::Rejected {
            status: 400,
            message: None,
        }
    );
    assert_eq!(
        state.deliver_bodies.lock().await[0]["digest_title"],
        "R2K - 20240302"
    );
}

#[tokio::test]
async fn download_returns_raw_bytes() {
    let (server_url, state) = spawn_reader_server().await.expect("spawn server");
    let backend = backend(&server_url);
    backend.login(PASSWORD).await.expect("login");

    let bytes = backend
        .download_bundle(&sample_bundle())
        .await
        .expect("download");
    assert_eq!(bytes, b"PK\x03\x04epub-bytes".to_vec());
    assert!(state.download_bodies.lock().await[0]
        .get("digest_title")
        .is_none());
}

#[tokio::test]
async fn login_redirect_is_an_auth_challenge() {
    let (server_url, _state) = spawn_reader_server().await.expect("spawn server");
    let backend = backend(&server_url);

    let err = backend
        .download_bundle(&sample_bundle())
        .await
        .expect_err("must challenge");
    assert_eq!(err, BackendError::AuthRequired);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let backend = backend(&format!("http://{addr}"));
    let err = backend.list_articles(None).await.expect_err("must fail");
    assert!(matches!(err, BackendError::Transport(_)), "{err:?}");
    assert!(err.message().is_some());
}

#[test]
fn login_entry_point_resolves_against_base_path() {
    let backend = backend("http://reader.local/app");
    assert_eq!(backend.login_entry_point(), "http://reader.local/app/login");
    assert_eq!(backend.server_url().as_str(), "http://reader.local/app/");
}
