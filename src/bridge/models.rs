// SPDX-License-Identifier: GPL-3.0-only
use std::collections::HashMap;

/// Download status of an asset pack.
///
/// Codes are shared with the polling caller's constant table and must not be
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PackStatus {
    Unknown = 0,
    Pending = 1,
    Downloading = 2,
    Transferring = 3,
    Completed = 4,
    Failed = 5,
    Canceled = 6,
    WaitingForWifi = 7,
    NotInstalled = 8,
    RequiresUserConfirmation = 9,
}

impl PackStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Error reported for a pack. Only meaningful when the status is `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PackErrorCode {
    NoError = 0,
    AppUnavailable = -1,
    PackUnavailable = -2,
    InvalidRequest = -3,
    DownloadNotFound = -4,
    ApiNotAvailable = -5,
    NetworkError = -6,
    AccessDenied = -7,
    InsufficientStorage = -10,
    PlayStoreNotFound = -11,
    NetworkUnrestricted = -12,
    AppNotOwned = -13,
    ConfirmationNotRequired = -14,
    UnrecognizedInstallation = -15,
    InternalError = -100,
}

impl PackErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Point-in-time snapshot of one asset pack as reported by the delivery
/// collaborator. Snapshots are replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackState {
    pub name: String,
    pub status: PackStatus,
    pub error_code: PackErrorCode,
    pub bytes_downloaded: u64,
    pub total_bytes_to_download: u64,
    pub transfer_progress_percentage: u32,
}

impl PackState {
    /// Snapshot with no transfer data and no error
    pub fn new(name: impl Into<String>, status: PackStatus) -> Self {
        Self {
            name: name.into(),
            status,
            error_code: PackErrorCode::NoError,
            bytes_downloaded: 0,
            total_bytes_to_download: 0,
            transfer_progress_percentage: 0,
        }
    }

    pub fn failed(name: impl Into<String>, error_code: PackErrorCode) -> Self {
        Self {
            error_code,
            ..Self::new(name, PackStatus::Failed)
        }
    }

    pub fn with_progress(mut self, bytes_downloaded: u64, total_bytes_to_download: u64) -> Self {
        self.bytes_downloaded = bytes_downloaded;
        self.total_bytes_to_download = total_bytes_to_download;
        self.transfer_progress_percentage = progress_percentage(bytes_downloaded, total_bytes_to_download);
        self
    }
}

/// Result of a multi-pack collaborator call, keyed by pack name
pub type PackStates = HashMap<String, PackState>;

/// Whole-percent progress, clamped to 100. Unknown totals report 0.
pub fn progress_percentage(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(done) * 100 / u128::from(total)).min(100);
    pct as u32
}
