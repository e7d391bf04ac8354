// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::models::{PackState, PackStates, PackStatus};
use crate::config::Config;
use crate::delivery::{AssetPackManager, StateUpdateListener, TaskOutcome};

/// How a scripted collaborator call resolves
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Complete,
    Cancel,
    Fail(String),
}

/// In-memory collaborator whose answers are set up by the test.
///
/// `fetch` and `get_pack_states` resolve with the scripted outcome for the
/// pack (default: complete), reporting whatever state was registered with
/// `set_state`. Packs without a registered state are left out of the result.
#[derive(Default)]
pub struct ScriptedAssetPackManager {
    states: Mutex<HashMap<String, PackState>>,
    state_outcomes: Mutex<HashMap<String, ScriptedOutcome>>,
    remove_outcomes: Mutex<HashMap<String, ScriptedOutcome>>,
    delays: Mutex<HashMap<String, Duration>>,
    locations: Mutex<HashMap<String, PathBuf>>,
    listeners: Mutex<Vec<Arc<dyn StateUpdateListener>>>,
}

impl ScriptedAssetPackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, state: PackState) {
        self.states.lock().insert(state.name.clone(), state);
    }

    /// Outcome of `fetch` and `get_pack_states` for this pack
    pub fn script_states(&self, pack_name: &str, outcome: ScriptedOutcome) {
        self.state_outcomes.lock().insert(pack_name.to_string(), outcome);
    }

    pub fn script_remove(&self, pack_name: &str, outcome: ScriptedOutcome) {
        self.remove_outcomes.lock().insert(pack_name.to_string(), outcome);
    }

    /// Delay every asynchronous answer for this pack
    pub fn set_delay(&self, pack_name: &str, delay: Duration) {
        self.delays.lock().insert(pack_name.to_string(), delay);
    }

    pub fn set_location(&self, pack_name: &str, path: PathBuf) {
        self.locations.lock().insert(pack_name.to_string(), path);
    }

    /// Deliver an unsolicited update to every registered listener
    pub fn push(&self, state: PackState) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener.on_state_update(state.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    async fn delay(&self, pack_name: &str) {
        let delay = self.delays.lock().get(pack_name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn resolve_states(&self, pack_names: &[String]) -> TaskOutcome<PackStates> {
        let mut result = PackStates::new();
        for name in pack_names {
            self.delay(name).await;
            let outcome = self
                .state_outcomes
                .lock()
                .get(name)
                .cloned()
                .unwrap_or(ScriptedOutcome::Complete);
            match outcome {
                ScriptedOutcome::Complete => {
                    if let Some(state) = self.states.lock().get(name) {
                        result.insert(name.clone(), state.clone());
                    }
                }
                ScriptedOutcome::Cancel => return TaskOutcome::Canceled,
                ScriptedOutcome::Fail(message) => return TaskOutcome::Failed(message),
            }
        }
        TaskOutcome::Completed(result)
    }
}

#[async_trait]
impl AssetPackManager for ScriptedAssetPackManager {
    async fn fetch(&self, pack_names: &[String]) -> TaskOutcome<PackStates> {
        self.resolve_states(pack_names).await
    }

    async fn get_pack_states(&self, pack_names: &[String]) -> TaskOutcome<PackStates> {
        self.resolve_states(pack_names).await
    }

    fn cancel(&self, pack_names: &[String]) -> PackStates {
        let mut states = self.states.lock();
        let mut result = PackStates::new();
        for name in pack_names {
            if let Some(state) = states.get_mut(name) {
                state.status = PackStatus::Canceled;
                result.insert(name.clone(), state.clone());
            }
        }
        result
    }

    async fn remove_pack(&self, pack_name: &str) -> TaskOutcome<()> {
        self.delay(pack_name).await;
        let outcome = self
            .remove_outcomes
            .lock()
            .get(pack_name)
            .cloned()
            .unwrap_or(ScriptedOutcome::Complete);
        match outcome {
            ScriptedOutcome::Complete => TaskOutcome::Completed(()),
            ScriptedOutcome::Cancel => TaskOutcome::Canceled,
            ScriptedOutcome::Fail(message) => TaskOutcome::Failed(message),
        }
    }

    fn pack_location(&self, pack_name: &str) -> Option<PathBuf> {
        self.locations.lock().get(pack_name).cloned()
    }

    fn register_listener(&self, listener: Arc<dyn StateUpdateListener>) {
        self.listeners.lock().push(listener);
    }
}

/// Create a test configuration with temporary paths
pub fn create_test_config() -> Config {
    use std::net::SocketAddr;
    use std::str::FromStr;

    let temp_dir = std::env::temp_dir().join(format!("pad-test-{}", uuid::Uuid::new_v4()));

    Config {
        packs_dir: temp_dir.join("packs"),
        delivery_base_url: "http://localhost:3000/packs/".to_string(),
        local_api_bind: SocketAddr::from_str("127.0.0.1:0").unwrap(), // Use port 0 to auto-assign
        download_timeout_secs: 5,
        max_download_retries: 1,
        event_backlog_warn_threshold: 64,
        log_level: "error".to_string(), // Reduce log noise in tests
        log_json: false,
    }
}

/// Create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().expect("Failed to create temp directory")
}
