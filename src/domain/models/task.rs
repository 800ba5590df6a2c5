//! Task state as tracked by the in-memory registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::process::ProcessHandle;

/// Lifecycle status of an analysis task.
///
/// The runner never sets `pending`; that state belongs to the ledger before
/// the task is dispatched here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Cancelling,
    Cancelled,
    Completed,
    Failed,
    Cleaned,
    CleanupFailed,
}

impl TaskStatus {
    /// Wire representation used in ledger payloads and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cleaned => "cleaned",
            Self::CleanupFailed => "cleanup_failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live registry entry for one analysis task.
///
/// Entries exist only while the task is active; they are never persisted and
/// do not survive a runner restart.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Handle to the collector subprocess, present only while it is alive.
    pub process: Option<ProcessHandle>,
    /// Analyzer under measurement; drives provisioning and cleanup decisions.
    pub analyzer_name: String,
    /// When the task was accepted. Informational only.
    pub started_at: DateTime<Utc>,
}

impl TaskEntry {
    /// Create a fresh entry in the `Running` state with no process yet.
    pub fn new(analyzer_name: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Running,
            process: None,
            analyzer_name: analyzer_name.into(),
            started_at: Utc::now(),
        }
    }
}
