//! In-memory task registry.
//!
//! The single source of truth for "is this task active". Entries are
//! ephemeral: they live only for the duration of a task and do not survive a
//! runner restart. The registry is the one piece of state shared between the
//! dispatch handler, the running pipeline, and inbound cancel/cleanup
//! requests, so every operation takes the mutex and is safe to call from any
//! of those flows in any interleaving.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::domain::models::{ProcessHandle, TaskEntry, TaskStatus};

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A fresh entry was created in the `Running` state.
    Accepted,
    /// An entry with this id is already live; its current status is returned
    /// and the existing entry is left untouched.
    AlreadyRunning(TaskStatus),
}

/// Mutex-guarded map from task id to live task state.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    inner: Mutex<HashMap<String, TaskEntry>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TaskEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new task, rejecting duplicates.
    ///
    /// A second registration for a live id never replaces the existing entry.
    pub fn register(&self, task_id: &str, analyzer_name: &str) -> RegisterOutcome {
        let mut map = self.lock();
        if let Some(existing) = map.get(task_id) {
            return RegisterOutcome::AlreadyRunning(existing.status);
        }
        map.insert(task_id.to_string(), TaskEntry::new(analyzer_name));
        RegisterOutcome::Accepted
    }

    /// Snapshot of the entry for `task_id`, if live.
    pub fn entry(&self, task_id: &str) -> Option<TaskEntry> {
        self.lock().get(task_id).cloned()
    }

    /// Current status for `task_id`, if live.
    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        self.lock().get(task_id).map(|entry| entry.status)
    }

    /// Attach the collector process handle to a live entry.
    pub fn set_process(&self, task_id: &str, handle: ProcessHandle) {
        if let Some(entry) = self.lock().get_mut(task_id) {
            entry.process = Some(handle);
        }
    }

    /// Detach the process handle once the subprocess has been reaped or
    /// killed. No-op if the entry is gone.
    pub fn clear_process(&self, task_id: &str) {
        if let Some(entry) = self.lock().get_mut(task_id) {
            entry.process = None;
        }
    }

    /// Mark a live entry `Cancelling`. Returns whether an entry was updated.
    pub fn mark_cancelling(&self, task_id: &str) -> bool {
        self.transition(task_id, TaskStatus::Cancelling)
    }

    /// Mark a live entry `Cancelled`. Returns whether an entry was updated.
    pub fn mark_cancelled(&self, task_id: &str) -> bool {
        self.transition(task_id, TaskStatus::Cancelled)
    }

    fn transition(&self, task_id: &str, status: TaskStatus) -> bool {
        match self.lock().get_mut(task_id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    /// Atomic remove-if-present.
    ///
    /// Both the pipeline's terminal handler and the cancel/cleanup flow call
    /// this for the same id; whichever runs second gets `None` and treats it
    /// as already done.
    pub fn remove(&self, task_id: &str) -> Option<TaskEntry> {
        self.lock().remove(task_id)
    }

    /// Number of live entries.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}
