//! Bounded in-memory activity log.
//!
//! Every operator-visible event (commands, rejections, emergency stops,
//! broker connectivity) is recorded here and mirrored as a `tracing` event.
//! The log keeps the most recent 100 entries; the dashboard polls them via
//! `GET /api/logs`. File rotation and export are deliberately not handled
//! here, they belong to an external collaborator.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

/// Maximum number of retained entries.
const MAX_ENTRIES: usize = 100;

/// Severity of an activity entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityLevel {
    /// Diagnostic detail (broker handshakes, publishes).
    Debug,
    /// Normal operator actions.
    Info,
    /// Degraded but functioning (publish failed, state committed).
    Warning,
    /// A request failed outright.
    Error,
    /// Emergency stop events.
    Critical,
}

/// One recorded event.
#[derive(Clone, Debug, Serialize)]
pub struct ActivityEntry {
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Event category (`command`, `emergency`, `broker`, ...).
    pub kind: String,
    /// Human-readable description.
    pub message: String,
    /// Structured payload, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Severity.
    pub level: ActivityLevel,
}

/// Thread-safe ring buffer of recent activity.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
}

impl ActivityLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event, evicting the oldest entry once full.
    pub fn record(
        &self,
        kind: impl Into<String>,
        message: impl Into<String>,
        data: Option<Value>,
        level: ActivityLevel,
    ) {
        let kind = kind.into();
        let message = message.into();

        match level {
            ActivityLevel::Debug => tracing::debug!(kind = %kind, "{message}"),
            ActivityLevel::Info => tracing::info!(kind = %kind, "{message}"),
            ActivityLevel::Warning => tracing::warn!(kind = %kind, "{message}"),
            ActivityLevel::Error | ActivityLevel::Critical => {
                tracing::error!(kind = %kind, "{message}")
            }
        }

        let entry = ActivityEntry {
            timestamp: unix_now(),
            kind,
            message,
            data,
            level,
        };

        let mut entries = self.entries.lock().unwrap();
        if entries.len() == MAX_ENTRIES {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        let entries = self.entries.lock().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
