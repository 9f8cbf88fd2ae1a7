//! Remix endpoint acceptance tests.
//!
//! Boots the real server against a mock artifact hub and checks
//! attribution stripping, ownership resolution, and the visibility
//! rules that collapse everything hidden into 404.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use parking_lot::Mutex;

use sitesmith_server::deploy::inject_attribution;

/// Scripted artifact hub for read paths.
struct MockHub {
    /// Space metadata; `None` replays 404.
    info: Mutex<Option<serde_json::Value>>,
    /// Entry file contents; `None` replays 404.
    raw: Mutex<Option<String>>,
    /// Username returned from the identity endpoint.
    username: Mutex<String>,
}

async fn space_info(
    State(state): State<Arc<MockHub>>,
    Path((_ns, _name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.info.lock().clone() {
        Some(info) => axum::Json(info).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn raw_file(
    State(state): State<Arc<MockHub>>,
    Path((_ns, _name, _path)): Path<(String, String, String)>,
) -> impl IntoResponse {
    match state.raw.lock().clone() {
        Some(raw) => raw.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn userinfo(State(state): State<Arc<MockHub>>) -> impl IntoResponse {
    axum::Json(serde_json::json!({"preferred_username": state.username.lock().clone()}))
}

async fn start_mock_hub() -> (SocketAddr, Arc<MockHub>) {
    let state = Arc::new(MockHub {
        info: Mutex::new(None),
        raw: Mutex::new(None),
        username: Mutex::new("alice".to_string()),
    });
    let app = Router::new()
        .route("/api/spaces/{ns}/{name}", get(space_info))
        .route("/spaces/{ns}/{name}/raw/main/{path}", get(raw_file))
        .route("/oauth/userinfo", get(userinfo))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (addr, state)
}

async fn start_server(hub: SocketAddr) -> SocketAddr {
    let config = sitesmith_server::config::ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        hub_base_url: format!("http://{hub}"),
        ..Default::default()
    };
    let (addr, _handle) = sitesmith_server::server::Server::new(config)
        .start()
        .await
        .unwrap();
    addr
}

fn public_static_space(author: &str) -> serde_json::Value {
    serde_json::json!({"sdk": "static", "private": false, "author": author})
}

const ORIGINAL: &str = "<html><body>Hello</body></html>";

// ── Happy paths ────────────────────────────────────────────────────────

#[tokio::test]
async fn remix_strips_attribution_and_reports_owner() {
    let (hub, mock) = start_mock_hub().await;
    *mock.info.lock() = Some(public_static_space("alice"));
    *mock.raw.lock() = Some(inject_attribution(ORIGINAL, "alice/site1"));
    let server = start_server(hub).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{server}/api/remix/alice/site1"))
        .header("authorization", "Bearer hf_token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["repo_id"], "alice/site1");
    // Deploy's badge is stripped byte for byte, recovering the original.
    assert_eq!(body["html"], ORIGINAL);
    assert_eq!(body["is_owner"], true);
}

#[tokio::test]
async fn remix_without_token_is_never_owner() {
    let (hub, mock) = start_mock_hub().await;
    *mock.info.lock() = Some(public_static_space("alice"));
    *mock.raw.lock() = Some(inject_attribution(ORIGINAL, "alice/site1"));
    let server = start_server(hub).await;

    let resp = reqwest::get(format!("http://{server}/api/remix/alice/site1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["is_owner"], false);
}

#[tokio::test]
async fn remix_by_someone_else_is_not_owner() {
    let (hub, mock) = start_mock_hub().await;
    *mock.info.lock() = Some(public_static_space("alice"));
    *mock.raw.lock() = Some(inject_attribution(ORIGINAL, "alice/site1"));
    *mock.username.lock() = "bob".to_string();
    let server = start_server(hub).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{server}/api/remix/alice/site1"))
        .header("authorization", "Bearer hf_token")
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["is_owner"], false);
}

#[tokio::test]
async fn remix_leaves_foreign_attribution_alone() {
    // A badge for a different repo id is not this space's badge.
    let (hub, mock) = start_mock_hub().await;
    *mock.info.lock() = Some(public_static_space("alice"));
    let foreign = inject_attribution(ORIGINAL, "carol/other-site");
    *mock.raw.lock() = Some(foreign.clone());
    let server = start_server(hub).await;

    let resp = reqwest::get(format!("http://{server}/api/remix/alice/site1"))
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["html"], foreign);
}

// ── Visibility rules ───────────────────────────────────────────────────

#[tokio::test]
async fn remix_missing_space_is_404() {
    let (hub, _mock) = start_mock_hub().await;
    let server = start_server(hub).await;

    let resp = reqwest::get(format!("http://{server}/api/remix/alice/ghost"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn remix_private_space_is_404() {
    let (hub, mock) = start_mock_hub().await;
    *mock.info.lock() =
        Some(serde_json::json!({"sdk": "static", "private": true, "author": "alice"}));
    *mock.raw.lock() = Some(ORIGINAL.to_string());
    let server = start_server(hub).await;

    let resp = reqwest::get(format!("http://{server}/api/remix/alice/secret"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn remix_non_static_space_is_404() {
    let (hub, mock) = start_mock_hub().await;
    *mock.info.lock() =
        Some(serde_json::json!({"sdk": "gradio", "private": false, "author": "alice"}));
    *mock.raw.lock() = Some(ORIGINAL.to_string());
    let server = start_server(hub).await;

    let resp = reqwest::get(format!("http://{server}/api/remix/alice/app"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn remix_with_missing_entry_file_is_404() {
    let (hub, mock) = start_mock_hub().await;
    *mock.info.lock() = Some(public_static_space("alice"));
    let server = start_server(hub).await;

    let resp = reqwest::get(format!("http://{server}/api/remix/alice/empty"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
