// SPDX-License-Identifier: GPL-3.0-only
//! Ordered event stream drained by the polling caller.

use crossbeam_queue::SegQueue;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Kind of a queued event. Ordinals are part of the poll contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PackEventKind {
    StateUpdated = 0,
    StateError = 1,
    RemoveCompleted = 2,
    RemoveCanceled = 3,
    RemoveError = 4,
    // Reserved for the confirmation-dialog flow; nothing produces these yet.
    DialogConfirmed = 5,
    DialogDeclined = 6,
    DialogCanceled = 7,
    DialogError = 8,
}

impl PackEventKind {
    pub fn ordinal(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEvent {
    pub pack_name: String,
    pub kind: PackEventKind,
    /// Human-readable error detail, if any
    pub extra: Option<String>,
}

impl PackEvent {
    pub fn new(pack_name: impl Into<String>, kind: PackEventKind) -> Self {
        Self {
            pack_name: pack_name.into(),
            kind,
            extra: None,
        }
    }

    pub fn with_extra(pack_name: impl Into<String>, kind: PackEventKind, extra: impl Into<String>) -> Self {
        Self {
            pack_name: pack_name.into(),
            kind,
            extra: Some(extra.into()),
        }
    }
}

/// Wire form of a dequeued event handed to the polling caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub pack_name: String,
    pub event_type: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl From<PackEvent> for EventRecord {
    fn from(event: PackEvent) -> Self {
        Self {
            pack_name: event.pack_name,
            event_type: event.kind.ordinal(),
            extra: event.extra,
        }
    }
}

/// Unbounded multi-producer FIFO of pack events.
///
/// Producers never block and nothing is dropped. A warning is logged each
/// time the backlog reaches a multiple of `warn_threshold`.
pub struct EventQueue {
    inner: SegQueue<PackEvent>,
    warn_threshold: usize,
}

impl EventQueue {
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            inner: SegQueue::new(),
            warn_threshold: warn_threshold.max(1),
        }
    }

    /// Append a fully built event at the tail
    pub fn push(&self, event: PackEvent) {
        self.inner.push(event);

        let backlog = self.inner.len();
        if self.backlog_warrants_warning(backlog) {
            warn!(backlog, "Pack event queue is not being drained");
        }
    }

    /// A consumer may drain the queue between `push` and `len`, so 0 is possible
    fn backlog_warrants_warning(&self, backlog: usize) -> bool {
        backlog > 0 && backlog % self.warn_threshold == 0
    }

    /// Remove and return the head event, if any
    pub fn pop(&self) -> Option<PackEvent> {
        self.inner.pop()
    }

    /// Approximate number of queued events
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}
