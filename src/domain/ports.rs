//! Ports: trait seams between the lifecycle manager and its collaborators.

use async_trait::async_trait;

use crate::domain::models::TaskStatus;

/// Pushes task status transitions to the external ledger.
///
/// Delivery is best-effort by design: implementations log failures and return
/// `false`, and callers never retry. The runner's local view of a task can
/// therefore diverge from the ledger's after a single failed report.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Report a status transition for `task_id`. Returns whether the ledger
    /// acknowledged the update.
    async fn report(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<&str>,
        metrics_file: Option<&str>,
    ) -> bool;
}
