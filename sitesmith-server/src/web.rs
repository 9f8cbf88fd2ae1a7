//! HTTP surface: streaming generation, deploy, remix, health.
//!
//! Generation streams raw text fragments as a chunked body; all other
//! endpoints speak JSON. Errors are JSON before the first byte; once a
//! generation body has started, an upstream failure just ends it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::deploy::{self, DeployRequest};
use crate::error::ApiError;
use crate::generate::{self, GenerateRequest};
use crate::remix;
use crate::server::SharedState;

/// Build the axum router.
pub fn router(state: Arc<SharedState>) -> Router {
    let mut app = Router::new()
        .route("/api/v1/health", get(api_health))
        .route("/api/generate", post(api_generate))
        .route("/api/deploy", post(api_deploy))
        .route("/api/remix/{namespace}/{repo}", get(api_remix))
        .layer(CorsLayer::permissive());

    // Serve the built web client when configured.
    if let Some(ref web_dir) = state.config.web_static_dir {
        let dir = std::path::PathBuf::from(web_dir);
        if dir.exists() {
            tracing::info!("Serving web client from {}", dir.display());
            // SPA fallback: index.html for any path not matching a file
            let index_path = dir.join("index.html");
            let serve = tower_http::services::ServeDir::new(&dir)
                .append_index_html_on_directories(true)
                .fallback(tower_http::services::ServeFile::new(index_path));
            app = app.fallback_service(serve);
        } else {
            tracing::warn!("Web static dir not found: {}", dir.display());
        }
    }

    app.with_state(state)
}

// ── Request plumbing ───────────────────────────────────────────────────

/// First `x-forwarded-for` hop, else the socket peer.
fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

/// Bearer token from the Authorization header. Validation happened
/// upstream; an absent token just means an anonymous caller.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ── Handlers ───────────────────────────────────────────────────────────

/// Server start time (set once on first call).
static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    uptime_secs: u64,
}

async fn api_health() -> Json<HealthResponse> {
    let start = START_TIME.get_or_init(SystemTime::now);
    Json(HealthResponse {
        ok: true,
        uptime_secs: start.elapsed().unwrap_or_default().as_secs(),
    })
}

async fn api_generate(
    State(state): State<Arc<SharedState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers);
    let ip = client_ip(&headers, addr);
    let rx = generate::generate(&state, req, token, ip).await?;

    // Relay fragments in channel order; dropping the body drops the
    // receiver, which tells the generation task to stop.
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let fragment = rx.recv().await?;
        Some((Ok::<_, Infallible>(Bytes::from(fragment)), rx))
    });
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

#[derive(Serialize)]
struct DeployResponse {
    ok: bool,
    repo_id: String,
    url: String,
}

async fn api_deploy(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Json(req): Json<DeployRequest>,
) -> Result<Json<DeployResponse>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::InvalidRequest("missing access token".to_string()))?;
    let repo_id = deploy::deploy(&state, req, &token).await?;
    let url = format!(
        "{}/spaces/{repo_id}",
        state.config.hub_base_url.trim_end_matches('/')
    );
    Ok(Json(DeployResponse {
        ok: true,
        repo_id,
        url,
    }))
}

#[derive(Serialize)]
struct RemixResponse {
    ok: bool,
    html: String,
    is_owner: bool,
    repo_id: String,
}

async fn api_remix(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    Path((namespace, repo)): Path<(String, String)>,
) -> Result<Json<RemixResponse>, ApiError> {
    let token = bearer_token(&headers);
    let repo_id = format!("{namespace}/{repo}");
    let result = remix::remix(&state, &repo_id, token.as_deref()).await?;
    Ok(Json(RemixResponse {
        ok: true,
        html: result.html,
        is_owner: result.is_owner,
        repo_id: result.repo_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn addr() -> SocketAddr {
        "10.0.0.1:9999".parse().unwrap()
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        assert_eq!(client_ip(&headers, addr()), "203.0.113.7");
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), addr()), "10.0.0.1");
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        assert_eq!(client_ip(&headers, addr()), "10.0.0.1");
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer hf_abc"));
        assert_eq!(bearer_token(&headers), Some("hf_abc".to_string()));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }
}
