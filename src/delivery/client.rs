// SPDX-License-Identifier: GPL-3.0-only
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::delivery::traits::DeliveryError;

/// First retry waits this long, doubling on each further attempt
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

pub struct HttpClient {
    client: Client,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("PadBridgeDaemon/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_retries: max_retries.max(1),
        })
    }

    /// Stream `url` into `output_path`, reporting `(downloaded, total)` after
    /// every chunk. `total` is 0 when the server sends no length. Transient
    /// failures restart the download from scratch.
    pub async fn download_with_retry<F>(
        &self,
        url: &Url,
        output_path: &Path,
        mut on_progress: F,
    ) -> Result<u64, DeliveryError>
    where
        F: FnMut(u64, u64) + Send,
    {
        let mut attempt = 1;
        loop {
            match self.download_once(url, output_path, &mut on_progress).await {
                Ok(bytes) => {
                    if attempt > 1 {
                        info!(url = %url, attempt, "Download succeeded after retry");
                    }
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!(url = %url, attempt, error = %e, "Download attempt failed");
                    tokio::time::sleep(RETRY_BASE_DELAY * 2_u32.pow(attempt - 1)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn download_once<F>(
        &self,
        url: &Url,
        output_path: &Path,
        on_progress: &mut F,
    ) -> Result<u64, DeliveryError>
    where
        F: FnMut(u64, u64) + Send,
    {
        debug!(url = %url, path = %output_path.display(), "Starting download");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                status,
                url: url.to_string(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut file = tokio::fs::File::create(output_path).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        on_progress(downloaded, total);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            on_progress(downloaded, total);
        }
        file.flush().await?;

        debug!(url = %url, bytes = downloaded, "Download completed");
        Ok(downloaded)
    }
}
