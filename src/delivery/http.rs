// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::bridge::models::{progress_percentage, PackState, PackStates, PackStatus};
use crate::config::Config;
use crate::delivery::archive::extract_pack_archive;
use crate::delivery::client::HttpClient;
use crate::delivery::traits::{AssetPackManager, DeliveryError, StateUpdateListener, TaskOutcome};

const ASSETS_DIR: &str = "assets";
const PARTIAL_DIR: &str = ".partial";

/// Asset packs served as `<base_url>/<pack>.zip` and installed under
/// `<packs_dir>/<pack>/assets`.
///
/// `fetch` only queues the download; progress, completion and failure are
/// pushed to registered listeners from the background task. Archives are
/// unpacked into `<packs_dir>/.partial` and moved into place in one rename,
/// so an `assets` directory only ever holds a complete install.
pub struct HttpAssetPackManager {
    shared: Arc<ManagerShared>,
}

struct ActiveDownload {
    id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

// Lock order: `downloads` before `states`.
struct ManagerShared {
    client: HttpClient,
    base_url: Url,
    packs_dir: PathBuf,
    states: Mutex<HashMap<String, PackState>>,
    downloads: Mutex<HashMap<String, ActiveDownload>>,
    listeners: RwLock<Vec<Arc<dyn StateUpdateListener>>>,
}

impl HttpAssetPackManager {
    pub fn new(
        base_url: &str,
        packs_dir: PathBuf,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, DeliveryError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join drops the last segment unless the base ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        discard_partial_downloads(&packs_dir);
        let states = scan_installed(&packs_dir);
        info!(packs_dir = %packs_dir.display(), installed = states.len(), "Loaded installed packs");

        Ok(Self {
            shared: Arc::new(ManagerShared {
                client: HttpClient::new(timeout, max_retries)?,
                base_url,
                packs_dir,
                states: Mutex::new(states),
                downloads: Mutex::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
            }),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, DeliveryError> {
        Self::new(
            &config.delivery_base_url,
            config.packs_dir.clone(),
            Duration::from_secs(config.download_timeout_secs),
            config.max_download_retries,
        )
    }
}

impl Drop for HttpAssetPackManager {
    fn drop(&mut self) {
        for (name, download) in self.shared.downloads.lock().drain() {
            debug!(pack = %name, "Aborting download on shutdown");
            download.cancel.cancel();
            download.handle.abort();
        }
    }
}

/// Pack names become directory names, so anything that could leave the
/// packs directory is refused.
pub fn validate_pack_name(name: &str) -> Result<(), DeliveryError> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(DeliveryError::InvalidPackName(name.to_string()))
    }
}

fn discard_partial_downloads(packs_dir: &Path) {
    match std::fs::remove_dir_all(packs_dir.join(PARTIAL_DIR)) {
        Ok(()) => debug!("Discarded partial downloads from an earlier run"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, "Failed to discard partial downloads"),
    }
}

/// Packs installed by an earlier run
fn scan_installed(packs_dir: &Path) -> HashMap<String, PackState> {
    let mut states = HashMap::new();
    let Ok(entries) = std::fs::read_dir(packs_dir) else {
        return states;
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if validate_pack_name(&name).is_ok() && entry.path().join(ASSETS_DIR).is_dir() {
            states.insert(name.clone(), PackState::new(name, PackStatus::Completed));
        }
    }
    states
}

impl ManagerShared {
    fn pack_dir(&self, name: &str) -> PathBuf {
        self.packs_dir.join(name)
    }

    fn assets_dir(&self, name: &str) -> PathBuf {
        self.pack_dir(name).join(ASSETS_DIR)
    }

    fn partial_path(&self, name: &str, id: Uuid) -> PathBuf {
        self.packs_dir.join(PARTIAL_DIR).join(format!("{}-{}.zip", id, name))
    }

    fn staging_dir(&self, name: &str, id: Uuid) -> PathBuf {
        self.packs_dir.join(PARTIAL_DIR).join(format!("{}-{}", id, name))
    }

    fn state_of(&self, name: &str) -> PackState {
        if let Err(e) = validate_pack_name(name) {
            return PackState::failed(name, e.error_code());
        }
        self.states
            .lock()
            .get(name)
            .cloned()
            .unwrap_or_else(|| PackState::new(name, PackStatus::NotInstalled))
    }

    /// Caller holds the `downloads` lock
    fn publish(&self, state: PackState) {
        self.states.lock().insert(state.name.clone(), state.clone());

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_state_update(state.clone());
        }
    }

    /// Publish `state` only while download `id` is still the active one for
    /// `name`. With `finished` set, its bookkeeping is dropped in the same step.
    fn publish_if_active(&self, name: &str, id: Uuid, state: PackState, finished: bool) -> bool {
        let mut downloads = self.downloads.lock();
        match downloads.get(name) {
            Some(active) if active.id == id => {}
            _ => return false,
        }
        if finished {
            downloads.remove(name);
        }
        self.publish(state);
        true
    }

    /// Move the staged archive contents into place and announce completion,
    /// unless the download was canceled first. Returns whether it was installed.
    fn commit_install(&self, name: &str, id: Uuid, staging: &Path, state: PackState) -> Result<bool, DeliveryError> {
        let mut downloads = self.downloads.lock();
        match downloads.get(name) {
            Some(active) if active.id == id => {}
            _ => return Ok(false),
        }
        std::fs::rename(staging, self.assets_dir(name))?;
        downloads.remove(name);
        self.publish(state);
        Ok(true)
    }

    fn start_download(self: &Arc<Self>, name: &str) -> Result<PackState, DeliveryError> {
        validate_pack_name(name)?;
        let url = self.base_url.join(&format!("{}.zip", name))?;

        let mut downloads = self.downloads.lock();
        let current = self.state_of(name);
        if downloads.contains_key(name) || current.status == PackStatus::Completed {
            return Ok(current);
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let pending = PackState::new(name, PackStatus::Pending);
        self.states.lock().insert(name.to_string(), pending.clone());

        info!(pack = %name, url = %url, "Queued pack download");
        // The task cannot publish before its entry is inserted: every publish
        // needs the downloads lock held here.
        let handle = tokio::spawn(Arc::clone(self).run_download(name.to_string(), id, url, cancel.clone()));
        downloads.insert(name.to_string(), ActiveDownload { id, cancel, handle });

        Ok(pending)
    }

    async fn run_download(self: Arc<Self>, name: String, id: Uuid, url: Url, cancel: CancellationToken) {
        let partial_path = self.partial_path(&name, id);
        let staging_dir = self.staging_dir(&name, id);

        let result = tokio::select! {
            result = self.download_and_install(&name, id, &url, &partial_path, &staging_dir, &cancel) => result,
            _ = cancel.cancelled() => Err(DeliveryError::Canceled),
        };

        if let Err(e) = tokio::fs::remove_file(&partial_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(pack = %name, error = %e, "Failed to remove partial download");
            }
        }
        if let Err(e) = tokio::fs::remove_dir_all(&staging_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(pack = %name, error = %e, "Failed to remove staged pack");
            }
        }

        match result {
            Ok(()) => {}
            Err(DeliveryError::Canceled) => debug!(pack = %name, "Pack download canceled"),
            Err(e) => {
                warn!(pack = %name, error = %e, "Pack download failed");
                let (done, total) = self
                    .states
                    .lock()
                    .get(&name)
                    .map(|s| (s.bytes_downloaded, s.total_bytes_to_download))
                    .unwrap_or((0, 0));
                let failed = PackState::failed(&name, e.error_code()).with_progress(done, total);
                self.publish_if_active(&name, id, failed, true);
            }
        }
    }

    async fn download_and_install(
        &self,
        name: &str,
        id: Uuid,
        url: &Url,
        partial_path: &Path,
        staging_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), DeliveryError> {
        if let Some(parent) = partial_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut last_reported: Option<u32> = None;
        let bytes = self
            .client
            .download_with_retry(url, partial_path, |done, total| {
                let pct = progress_percentage(done, total);
                if last_reported != Some(pct) {
                    last_reported = Some(pct);
                    let state = PackState::new(name, PackStatus::Downloading).with_progress(done, total);
                    self.publish_if_active(name, id, state, false);
                }
            })
            .await?;

        let transferring = PackState::new(name, PackStatus::Transferring).with_progress(bytes, bytes);
        if !self.publish_if_active(name, id, transferring, false) {
            return Err(DeliveryError::Canceled);
        }

        let files = extract_pack_archive(partial_path, staging_dir, cancel.clone()).await?;
        debug!(pack = %name, files, "Pack archive extracted");
        tokio::fs::remove_file(partial_path).await?;

        // Leftovers from outside this manager would block the rename
        let assets_dir = self.assets_dir(name);
        if tokio::fs::try_exists(&assets_dir).await? {
            tokio::fs::remove_dir_all(&assets_dir).await?;
        }
        tokio::fs::create_dir_all(self.pack_dir(name)).await?;

        let completed = PackState::new(name, PackStatus::Completed).with_progress(bytes, bytes);
        if self.commit_install(name, id, staging_dir, completed)? {
            info!(pack = %name, bytes, "Pack installed");
            Ok(())
        } else {
            Err(DeliveryError::Canceled)
        }
    }
}

#[async_trait]
impl AssetPackManager for HttpAssetPackManager {
    async fn fetch(&self, pack_names: &[String]) -> TaskOutcome<PackStates> {
        let partial_dir = self.shared.packs_dir.join(PARTIAL_DIR);
        if let Err(e) = tokio::fs::create_dir_all(&partial_dir).await {
            return TaskOutcome::Failed(format!("Cannot prepare {}: {}", partial_dir.display(), e));
        }

        let mut states = PackStates::new();
        for name in pack_names {
            let state = self.shared.start_download(name).unwrap_or_else(|e| {
                warn!(pack = %name, error = %e, "Rejected pack fetch");
                PackState::failed(name, e.error_code())
            });
            states.insert(name.clone(), state);
        }
        TaskOutcome::Completed(states)
    }

    async fn get_pack_states(&self, pack_names: &[String]) -> TaskOutcome<PackStates> {
        let states = pack_names
            .iter()
            .map(|name| (name.clone(), self.shared.state_of(name)))
            .collect();
        TaskOutcome::Completed(states)
    }

    /// Signals the download task and returns at once. The task removes its
    /// own partial files.
    fn cancel(&self, pack_names: &[String]) -> PackStates {
        let mut states = PackStates::new();
        for name in pack_names {
            {
                let mut downloads = self.shared.downloads.lock();
                if let Some(download) = downloads.remove(name) {
                    download.cancel.cancel();
                    info!(pack = %name, "Canceled pack download");

                    let mut cached = self.shared.states.lock();
                    let canceled = match cached.get(name) {
                        Some(previous) => PackState {
                            status: PackStatus::Canceled,
                            ..previous.clone()
                        },
                        None => PackState::new(name.as_str(), PackStatus::Canceled),
                    };
                    cached.insert(name.clone(), canceled);
                }
            }
            states.insert(name.clone(), self.shared.state_of(name));
        }
        states
    }

    async fn remove_pack(&self, pack_name: &str) -> TaskOutcome<()> {
        if let Err(e) = validate_pack_name(pack_name) {
            return TaskOutcome::Failed(e.to_string());
        }
        if self.shared.downloads.lock().contains_key(pack_name) {
            return TaskOutcome::Failed(DeliveryError::DownloadInProgress(pack_name.to_string()).to_string());
        }

        let pack_dir = self.shared.pack_dir(pack_name);
        match tokio::fs::remove_dir_all(&pack_dir).await {
            Ok(()) => info!(pack = %pack_name, "Removed pack"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(pack = %pack_name, "Pack was not installed")
            }
            Err(e) => return TaskOutcome::Failed(format!("Cannot remove {}: {}", pack_dir.display(), e)),
        }

        self.shared.states.lock().remove(pack_name);
        TaskOutcome::Completed(())
    }

    fn pack_location(&self, pack_name: &str) -> Option<PathBuf> {
        validate_pack_name(pack_name).ok()?;
        let installed = self.shared.state_of(pack_name).status == PackStatus::Completed;
        installed.then(|| self.shared.assets_dir(pack_name))
    }

    fn register_listener(&self, listener: Arc<dyn StateUpdateListener>) {
        self.shared.listeners.write().push(listener);
    }
}
