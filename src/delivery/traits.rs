// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::bridge::models::{PackErrorCode, PackState, PackStates};

/// How an asynchronous collaborator call resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Canceled,
    Failed(String),
}

/// Sink for state changes the collaborator reports on its own, outside of
/// any call made through [`AssetPackManager`].
pub trait StateUpdateListener: Send + Sync {
    fn on_state_update(&self, state: PackState);
}

#[async_trait]
pub trait AssetPackManager: Send + Sync {
    /// Start downloading the given packs. Resolves once the request has been
    /// accepted, with the state of each pack at that point.
    async fn fetch(&self, pack_names: &[String]) -> TaskOutcome<PackStates>;

    /// Current state of the given packs
    async fn get_pack_states(&self, pack_names: &[String]) -> TaskOutcome<PackStates>;

    /// Cancel in-flight downloads and report the resulting states
    fn cancel(&self, pack_names: &[String]) -> PackStates;

    /// Delete an installed pack
    async fn remove_pack(&self, pack_name: &str) -> TaskOutcome<()>;

    /// Directory holding the pack's assets, if it is installed
    fn pack_location(&self, pack_name: &str) -> Option<PathBuf>;

    /// Register a sink for unsolicited state updates
    fn register_listener(&self, listener: Arc<dyn StateUpdateListener>);
}

#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("Invalid pack name: {0:?}")]
    InvalidPackName(String),

    #[error("Invalid delivery URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Server returned {status} for {url}")]
    Status { status: reqwest::StatusCode, url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive entry escapes the pack directory: {0}")]
    UnsafeArchiveEntry(String),

    #[error("Download of pack {0} is still in progress")]
    DownloadInProgress(String),

    #[error("Download was canceled")]
    Canceled,
}

impl DeliveryError {
    /// Error code reported in the pack state for this failure
    pub fn error_code(&self) -> PackErrorCode {
        match self {
            DeliveryError::InvalidPackName(_) | DeliveryError::InvalidUrl(_) => PackErrorCode::InvalidRequest,
            DeliveryError::Status { status, .. } if *status == reqwest::StatusCode::NOT_FOUND => {
                PackErrorCode::PackUnavailable
            }
            DeliveryError::Status { status, .. }
                if *status == reqwest::StatusCode::UNAUTHORIZED || *status == reqwest::StatusCode::FORBIDDEN =>
            {
                PackErrorCode::AccessDenied
            }
            DeliveryError::Status { .. } | DeliveryError::Network(_) => PackErrorCode::NetworkError,
            DeliveryError::Io(_)
            | DeliveryError::Archive(_)
            | DeliveryError::UnsafeArchiveEntry(_)
            | DeliveryError::DownloadInProgress(_)
            | DeliveryError::Canceled => PackErrorCode::InternalError,
        }
    }

    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            DeliveryError::Network(_) => true,
            DeliveryError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}
