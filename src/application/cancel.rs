//! Cooperative cancellation of running tasks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use nix::errno::Errno;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::models::{ProcessHandle, TaskStatus};
use crate::domain::ports::StatusReporter;
use crate::services::TaskRegistry;

use super::CleanupCoordinator;

/// Outcome of a cancel request, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task was cancelled and cleaned up.
    Cancelled,
    /// No live registry entry for this id.
    NotFound,
    /// The task is registered but its collector process has not started yet
    /// (provisioning is still in progress).
    NotRunning,
    /// Something went wrong mid-cancellation; the message describes it.
    Error(String),
}

/// Transitions a running task `running -> cancelling -> cancelled`.
///
/// Cancellation crosses two channels: the SIGTERM/SIGKILL delivered to the
/// process handle, which interrupts the pipeline's wait, and the status flag
/// on the registry entry, which the pipeline re-checks after its wait returns
/// to decide whether to suppress its own terminal report. Both are needed; a
/// kill alone would let a pipeline that already passed the check report
/// `completed` over our `cancelled`.
pub struct CancellationController {
    registry: Arc<TaskRegistry>,
    reporter: Arc<dyn StatusReporter>,
    cleanup: Arc<CleanupCoordinator>,
    grace_period: Duration,
}

impl CancellationController {
    /// Create a controller with the given grace window between SIGTERM and
    /// SIGKILL.
    pub fn new(
        registry: Arc<TaskRegistry>,
        reporter: Arc<dyn StatusReporter>,
        cleanup: Arc<CleanupCoordinator>,
        grace_period: Duration,
    ) -> Self {
        Self {
            registry,
            reporter,
            cleanup,
            grace_period,
        }
    }

    /// Cancel `task_id` if it is running.
    ///
    /// Never panics or propagates errors; failures come back as
    /// [`CancelOutcome::Error`].
    #[instrument(skip(self))]
    pub async fn cancel(&self, task_id: &str) -> CancelOutcome {
        let Some(entry) = self.registry.entry(task_id) else {
            warn!("Cancel requested for unknown task");
            return CancelOutcome::NotFound;
        };
        let Some(handle) = entry.process else {
            warn!("Cancel requested before the collector process started");
            return CancelOutcome::NotRunning;
        };

        match self.terminate(task_id, handle, &entry.analyzer_name).await {
            Ok(()) => CancelOutcome::Cancelled,
            Err(err) => {
                error!(error = %format!("{err:#}"), "Cancellation failed");
                CancelOutcome::Error(format!("{err:#}"))
            }
        }
    }

    async fn terminate(
        &self,
        task_id: &str,
        handle: ProcessHandle,
        analyzer_name: &str,
    ) -> Result<()> {
        // Flip the status first so a pipeline whose wait returns during the
        // grace window already sees the cancellation.
        self.registry.mark_cancelling(task_id);

        info!(pid = handle.pid(), "Sending SIGTERM to collector process");
        if let Err(err) = handle.terminate() {
            debug!(error = %err, "SIGTERM not delivered; process likely already exited");
        }

        let deadline = Instant::now() + self.grace_period;
        while handle.is_alive() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        if handle.is_alive() {
            warn!(
                pid = handle.pid(),
                grace_secs = self.grace_period.as_secs(),
                "Process survived the grace period, sending SIGKILL"
            );
            if let Err(errno) = handle.kill() {
                if errno != Errno::ESRCH {
                    return Err(anyhow::anyhow!(
                        "failed to force-kill collector process {}: {errno}",
                        handle.pid()
                    ));
                }
            }
        }

        self.registry.mark_cancelled(task_id);
        self.reporter
            .report(
                task_id,
                TaskStatus::Cancelled,
                Some("Task cancelled by user request"),
                None,
            )
            .await;
        self.registry.clear_process(task_id);

        // Cleanup runs synchronously so the caller's `cancelled` response
        // implies resources are already being reclaimed.
        self.cleanup.run(task_id, Some(analyzer_name)).await;

        info!("Task cancelled");
        Ok(())
    }
}
