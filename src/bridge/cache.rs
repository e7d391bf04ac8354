// SPDX-License-Identifier: GPL-3.0-only
use dashmap::DashMap;

use crate::bridge::models::{PackErrorCode, PackState, PackStatus};

/// Last known snapshot per pack name.
///
/// Last writer wins. Reads never wait on an in-flight operation, and a
/// missing entry is answered with the documented default rather than an
/// error.
#[derive(Default)]
pub struct StateCache {
    states: DashMap<String, PackState>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is cached for `name`
    pub fn put(&self, name: impl Into<String>, state: PackState) {
        self.states.insert(name.into(), state);
    }

    pub fn get(&self, name: &str) -> Option<PackState> {
        self.states.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn bytes_downloaded(&self, name: &str) -> u64 {
        self.read(name, |s| s.bytes_downloaded).unwrap_or(0)
    }

    pub fn total_bytes_to_download(&self, name: &str) -> u64 {
        self.read(name, |s| s.total_bytes_to_download).unwrap_or(0)
    }

    pub fn transfer_progress_percentage(&self, name: &str) -> u32 {
        self.read(name, |s| s.transfer_progress_percentage).unwrap_or(0)
    }

    pub fn status(&self, name: &str) -> PackStatus {
        self.read(name, |s| s.status).unwrap_or(PackStatus::Unknown)
    }

    pub fn error_code(&self, name: &str) -> PackErrorCode {
        self.read(name, |s| s.error_code).unwrap_or(PackErrorCode::PackUnavailable)
    }

    fn read<T>(&self, name: &str, field: impl FnOnce(&PackState) -> T) -> Option<T> {
        self.states.get(name).map(|entry| field(entry.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_unknown_pack() {
        let cache = StateCache::new();
        assert!(!cache.contains("missing"));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.bytes_downloaded("missing"), 0);
        assert_eq!(cache.total_bytes_to_download("missing"), 0);
        assert_eq!(cache.transfer_progress_percentage("missing"), 0);
        assert_eq!(cache.status("missing"), PackStatus::Unknown);
        assert_eq!(cache.error_code("missing"), PackErrorCode::PackUnavailable);
    }

    #[test]
    fn test_put_replaces_whole_snapshot() {
        let cache = StateCache::new();
        let first = PackState {
            name: "level1".to_string(),
            status: PackStatus::Failed,
            error_code: PackErrorCode::NetworkError,
            bytes_downloaded: 700,
            total_bytes_to_download: 1000,
            transfer_progress_percentage: 70,
        };
        cache.put("level1", first);

        let second = PackState::new("level1", PackStatus::Pending);
        cache.put("level1", second.clone());

        assert_eq!(cache.get("level1"), Some(second));
        assert_eq!(cache.bytes_downloaded("level1"), 0);
        assert_eq!(cache.total_bytes_to_download("level1"), 0);
        assert_eq!(cache.error_code("level1"), PackErrorCode::NoError);
        assert_eq!(cache.status("level1"), PackStatus::Pending);
        assert!(!cache.contains("level2"));
    }

    #[test]
    fn test_accessors_read_cached_fields() {
        let cache = StateCache::new();
        cache.put(
            "level2",
            PackState::new("level2", PackStatus::Downloading).with_progress(300, 1200),
        );
        assert!(cache.contains("level2"));
        assert_eq!(cache.bytes_downloaded("level2"), 300);
        assert_eq!(cache.total_bytes_to_download("level2"), 1200);
        assert_eq!(cache.transfer_progress_percentage("level2"), 25);
        assert_eq!(cache.status("level2"), PackStatus::Downloading);
        assert_eq!(cache.error_code("level2"), PackErrorCode::NoError);
    }
}
