// SPDX-License-Identifier: GPL-3.0-only
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::api::handlers::{ApiHandlers, ApiResponse, PackSummary};
use crate::bridge::AssetPackBridge;

pub struct HttpServer {
    handlers: ApiHandlers,
    addr: SocketAddr,
}

impl HttpServer {
    pub fn new(bridge: Arc<AssetPackBridge>, addr: SocketAddr) -> Self {
        Self {
            handlers: ApiHandlers::new(bridge),
            addr,
        }
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let app = router(Arc::new(self.handlers));

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

fn router(handlers: Arc<ApiHandlers>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/events/next", get(next_event_handler))
        .route("/api/packs/:name", get(pack_summary_handler))
        .route("/api/packs/:name/location", get(pack_location_handler))
        .route("/api/packs/:name/fetch", post(fetch_handler))
        .route("/api/packs/:name/state", post(query_state_handler))
        .route("/api/packs/:name/cancel", post(cancel_handler))
        .route("/api/packs/:name/remove", post(remove_handler))
        .route("/api/packs/:name/confirm", post(confirm_handler))
        .with_state(handlers)
}

async fn health_handler() -> Json<ApiResponse<&'static str>> {
    ApiHandlers::health().await
}

async fn next_event_handler(
    State(handlers): State<Arc<ApiHandlers>>,
) -> Json<ApiResponse<serde_json::Value>> {
    handlers.next_event().await
}

async fn pack_summary_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(name): Path<String>,
) -> Json<ApiResponse<PackSummary>> {
    handlers.pack_summary(Path(name)).await
}

async fn pack_location_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    handlers.pack_location(Path(name)).await
}

async fn fetch_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ApiResponse<String>>) {
    handlers.fetch(Path(name)).await
}

async fn query_state_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ApiResponse<String>>) {
    handlers.query_state(Path(name)).await
}

async fn cancel_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(name): Path<String>,
) -> Json<ApiResponse<PackSummary>> {
    handlers.cancel(Path(name)).await
}

async fn remove_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ApiResponse<String>>) {
    handlers.remove(Path(name)).await
}

async fn confirm_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ApiResponse<String>>) {
    handlers.confirm(Path(name)).await
}
