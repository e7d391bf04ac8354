// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::bridge::cache::StateCache;
use crate::bridge::events::{EventQueue, EventRecord, PackEvent, PackEventKind};
use crate::bridge::models::{PackErrorCode, PackState, PackStates, PackStatus};
use crate::delivery::{AssetPackManager, StateUpdateListener, TaskOutcome};

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Backlog size at which an undrained event queue is reported
    pub event_backlog_warn_threshold: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            event_backlog_warn_threshold: 1024,
        }
    }
}

/// State shared between dispatched operations, the push listener and the
/// poll surface.
struct BridgeShared {
    cache: StateCache,
    events: EventQueue,
}

impl BridgeShared {
    /// Cache a fresh snapshot and announce it. Every successful state report,
    /// dispatched or pushed, goes through here.
    fn record_state(&self, pack_name: &str, state: PackState) {
        self.cache.put(pack_name, state);
        self.events.push(PackEvent::new(pack_name, PackEventKind::StateUpdated));
    }

    fn record_states_outcome(&self, operation: &'static str, pack_name: &str, outcome: TaskOutcome<PackStates>) {
        match outcome {
            TaskOutcome::Completed(mut states) => match states.remove(pack_name) {
                Some(state) => {
                    debug!(operation, pack = %pack_name, status = ?state.status, "Pack state received");
                    self.record_state(pack_name, state);
                }
                None => {
                    warn!(operation, pack = %pack_name, "Collaborator reported no state for pack");
                    self.events.push(PackEvent::with_extra(
                        pack_name,
                        PackEventKind::StateError,
                        format!("No state reported for pack {}", pack_name),
                    ));
                }
            },
            TaskOutcome::Canceled => {
                debug!(operation, pack = %pack_name, "Pack state request canceled");
                self.events.push(PackEvent::new(pack_name, PackEventKind::StateError));
            }
            TaskOutcome::Failed(message) => {
                warn!(operation, pack = %pack_name, error = %message, "Pack state request failed");
                self.events.push(PackEvent::with_extra(pack_name, PackEventKind::StateError, message));
            }
        }
    }

    fn record_remove_outcome(&self, pack_name: &str, outcome: TaskOutcome<()>) {
        let event = match outcome {
            TaskOutcome::Completed(()) => {
                debug!(pack = %pack_name, "Pack removed");
                PackEvent::new(pack_name, PackEventKind::RemoveCompleted)
            }
            TaskOutcome::Canceled => {
                debug!(pack = %pack_name, "Pack removal canceled");
                PackEvent::new(pack_name, PackEventKind::RemoveCanceled)
            }
            TaskOutcome::Failed(message) => {
                warn!(pack = %pack_name, error = %message, "Pack removal failed");
                PackEvent::with_extra(pack_name, PackEventKind::RemoveError, message)
            }
        };
        self.events.push(event);
    }
}

impl StateUpdateListener for BridgeShared {
    fn on_state_update(&self, state: PackState) {
        debug!(pack = %state.name, status = ?state.status, "Pack state pushed");
        let pack_name = state.name.clone();
        self.record_state(&pack_name, state);
    }
}

/// Turns the asset-pack collaborator's asynchronous outcomes into a single
/// FIFO of events plus a cache of the latest state per pack, both readable
/// without blocking.
///
/// One instance is built per process and handed to whoever needs it.
/// `fetch`, `query_state` and `remove_pack` must be called from within a
/// tokio runtime.
pub struct AssetPackBridge {
    manager: Arc<dyn AssetPackManager>,
    shared: Arc<BridgeShared>,
}

impl AssetPackBridge {
    pub fn new(manager: Arc<dyn AssetPackManager>, options: BridgeOptions) -> Self {
        let shared = Arc::new(BridgeShared {
            cache: StateCache::new(),
            events: EventQueue::new(options.event_backlog_warn_threshold),
        });
        manager.register_listener(shared.clone());

        Self { manager, shared }
    }

    /// Request a download. A `StateUpdated` or `StateError` event follows
    /// once the collaborator answers.
    pub fn fetch(&self, pack_name: &str) -> JoinHandle<()> {
        debug!(pack = %pack_name, "Fetch requested");
        let manager = Arc::clone(&self.manager);
        let shared = Arc::clone(&self.shared);
        let pack_name = pack_name.to_string();

        tokio::spawn(async move {
            let outcome = manager.fetch(std::slice::from_ref(&pack_name)).await;
            shared.record_states_outcome("fetch", &pack_name, outcome);
        })
    }

    /// Request a fresh state report, announced like `fetch`
    pub fn query_state(&self, pack_name: &str) -> JoinHandle<()> {
        debug!(pack = %pack_name, "State query requested");
        let manager = Arc::clone(&self.manager);
        let shared = Arc::clone(&self.shared);
        let pack_name = pack_name.to_string();

        tokio::spawn(async move {
            let outcome = manager.get_pack_states(std::slice::from_ref(&pack_name)).await;
            shared.record_states_outcome("query_state", &pack_name, outcome);
        })
    }

    /// Cancel synchronously. The resulting state is cached and its event is
    /// queued before this returns.
    pub fn cancel(&self, pack_name: &str) {
        debug!(pack = %pack_name, "Cancel requested");
        let states = self.manager.cancel(&[pack_name.to_string()]);
        self.shared
            .record_states_outcome("cancel", pack_name, TaskOutcome::Completed(states));
    }

    /// Delete the pack. The cached state is left as it was.
    pub fn remove_pack(&self, pack_name: &str) -> JoinHandle<()> {
        debug!(pack = %pack_name, "Remove requested");
        let manager = Arc::clone(&self.manager);
        let shared = Arc::clone(&self.shared);
        let pack_name = pack_name.to_string();

        tokio::spawn(async move {
            let outcome = manager.remove_pack(&pack_name).await;
            shared.record_remove_outcome(&pack_name, outcome);
        })
    }

    /// Reserved for the confirmation-dialog flow. No collaborator supports it
    /// yet, so no dialog event is ever produced.
    pub fn show_confirmation_dialog(&self, pack_name: &str) {
        debug!(pack = %pack_name, "Confirmation dialog is not supported, ignoring request");
    }

    /// Installed location, or an empty string when the pack is not installed
    pub fn pack_location(&self, pack_name: &str) -> String {
        let location = self
            .manager
            .pack_location(pack_name)
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(pack = %pack_name, location = %location, "Pack location resolved");
        location
    }

    pub fn has_pack_state(&self, pack_name: &str) -> bool {
        self.shared.cache.contains(pack_name)
    }

    pub fn pack_bytes_downloaded(&self, pack_name: &str) -> u64 {
        self.shared.cache.bytes_downloaded(pack_name)
    }

    pub fn pack_error_code(&self, pack_name: &str) -> PackErrorCode {
        self.shared.cache.error_code(pack_name)
    }

    pub fn pack_status(&self, pack_name: &str) -> PackStatus {
        self.shared.cache.status(pack_name)
    }

    pub fn pack_total_bytes_to_download(&self, pack_name: &str) -> u64 {
        self.shared.cache.total_bytes_to_download(pack_name)
    }

    pub fn pack_transfer_progress_percentage(&self, pack_name: &str) -> u32 {
        self.shared.cache.transfer_progress_percentage(pack_name)
    }

    /// Take the oldest queued event
    pub fn next_event(&self) -> Option<EventRecord> {
        self.shared.events.pop().map(EventRecord::from)
    }

    /// Take the oldest queued event as a JSON object with `pack_name`,
    /// `event_type` and, when present, `extra`. Never fails: if the record
    /// cannot be serialized the failure is logged and a record without
    /// `extra` is returned.
    pub fn next_event_json(&self) -> Option<serde_json::Value> {
        let record = self.next_event()?;
        match serde_json::to_value(&record) {
            Ok(json) => Some(json),
            Err(e) => {
                error!(error = %e, pack = %record.pack_name, "Failed to serialize pack event");
                Some(serde_json::json!({
                    "pack_name": record.pack_name,
                    "event_type": record.event_type,
                }))
            }
        }
    }

    /// Approximate number of events waiting to be polled
    pub fn pending_events(&self) -> usize {
        self.shared.events.len()
    }
}
