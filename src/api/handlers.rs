// SPDX-License-Identifier: GPL-3.0-only
use axum::extract::Path;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::bridge::AssetPackBridge;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }
}

/// Cached view of one pack, with status and error as their numeric codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSummary {
    pub pack_name: String,
    pub has_state: bool,
    pub status: i32,
    pub error_code: i32,
    pub bytes_downloaded: u64,
    pub total_bytes_to_download: u64,
    pub transfer_progress_percentage: u32,
}

pub struct ApiHandlers {
    bridge: Arc<AssetPackBridge>,
}

impl ApiHandlers {
    pub fn new(bridge: Arc<AssetPackBridge>) -> Self {
        Self { bridge }
    }

    fn summary(&self, pack_name: &str) -> PackSummary {
        PackSummary {
            pack_name: pack_name.to_string(),
            has_state: self.bridge.has_pack_state(pack_name),
            status: self.bridge.pack_status(pack_name).code(),
            error_code: self.bridge.pack_error_code(pack_name).code(),
            bytes_downloaded: self.bridge.pack_bytes_downloaded(pack_name),
            total_bytes_to_download: self.bridge.pack_total_bytes_to_download(pack_name),
            transfer_progress_percentage: self.bridge.pack_transfer_progress_percentage(pack_name),
        }
    }
}

impl ApiHandlers {
    pub async fn health() -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::success("ok"))
    }

    /// Oldest queued event, or `data: null` when the queue is empty
    pub async fn next_event(&self) -> Json<ApiResponse<serde_json::Value>> {
        match self.bridge.next_event_json() {
            Some(record) => Json(ApiResponse::success(record)),
            None => Json(ApiResponse::empty()),
        }
    }

    pub async fn pack_summary(&self, Path(name): Path<String>) -> Json<ApiResponse<PackSummary>> {
        Json(ApiResponse::success(self.summary(&name)))
    }

    pub async fn pack_location(
        &self,
        Path(name): Path<String>,
    ) -> Result<Json<ApiResponse<String>>, StatusCode> {
        let location = self.bridge.pack_location(&name);
        if location.is_empty() {
            debug!(pack = %name, "Pack has no installed location");
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(Json(ApiResponse::success(location)))
    }

    pub async fn fetch(&self, Path(name): Path<String>) -> (StatusCode, Json<ApiResponse<String>>) {
        info!(pack = %name, "Fetch request received");
        self.bridge.fetch(&name);
        (StatusCode::ACCEPTED, Json(ApiResponse::success(name)))
    }

    pub async fn query_state(&self, Path(name): Path<String>) -> (StatusCode, Json<ApiResponse<String>>) {
        debug!(pack = %name, "State request received");
        self.bridge.query_state(&name);
        (StatusCode::ACCEPTED, Json(ApiResponse::success(name)))
    }

    /// Cancel is synchronous, so the response carries the resulting state
    pub async fn cancel(&self, Path(name): Path<String>) -> Json<ApiResponse<PackSummary>> {
        info!(pack = %name, "Cancel request received");
        self.bridge.cancel(&name);
        Json(ApiResponse::success(self.summary(&name)))
    }

    pub async fn remove(&self, Path(name): Path<String>) -> (StatusCode, Json<ApiResponse<String>>) {
        info!(pack = %name, "Remove request received");
        self.bridge.remove_pack(&name);
        (StatusCode::ACCEPTED, Json(ApiResponse::success(name)))
    }

    /// Accepted but currently produces no dialog event
    pub async fn confirm(&self, Path(name): Path<String>) -> (StatusCode, Json<ApiResponse<String>>) {
        info!(pack = %name, "Confirmation dialog request received");
        self.bridge.show_confirmation_dialog(&name);
        (StatusCode::ACCEPTED, Json(ApiResponse::success(name)))
    }
}
