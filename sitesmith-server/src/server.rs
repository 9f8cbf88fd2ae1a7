//! Server state and HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::hub::HubClient;
use crate::llm::InferenceClient;
use crate::quota::QuotaGuard;
use crate::web;

/// Process-wide state handed to every request handler.
///
/// The quota map is the only mutable piece; everything else is
/// read-only after startup.
pub struct SharedState {
    pub config: ServerConfig,
    pub quota: QuotaGuard,
    pub inference: InferenceClient,
    pub hub: HubClient,
}

impl SharedState {
    pub fn new(config: ServerConfig) -> Self {
        let http = reqwest::Client::new();
        let inference = InferenceClient::new(
            http.clone(),
            config.inference_base_url.clone(),
            config.model.clone(),
        );
        let hub = HubClient::new(http, config.hub_base_url.clone());
        let quota = QuotaGuard::new(config.free_generations);
        Self {
            config,
            quota,
            inference,
            hub,
        }
    }
}

pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address, so tests can start on port 0 and
    /// discover where the server landed.
    pub async fn start(self) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
        let state = Arc::new(SharedState::new(self.config));
        let listener = TcpListener::bind(&state.config.listen_addr)
            .await
            .with_context(|| format!("cannot bind {}", state.config.listen_addr))?;
        let addr = listener.local_addr()?;
        tracing::info!("HTTP API listening on {addr}");
        let app = web::router(state).into_make_service_with_connect_info::<SocketAddr>();
        let handle =
            tokio::spawn(async move { axum::serve(listener, app).await.context("server exited") });
        Ok((addr, handle))
    }

    /// Serve until the process is stopped.
    pub async fn run(self) -> Result<()> {
        let (_addr, handle) = self.start().await?;
        handle.await?
    }
}
