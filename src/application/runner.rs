//! Runner facade: the lifecycle manager's public surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::Semaphore;
use tracing::info;

use crate::domain::models::{Config, TaskStatus};
use crate::domain::ports::StatusReporter;
use crate::services::{PackageService, RegisterOutcome, RepositoryService, TaskRegistry};

use super::{
    metrics_file_path, AnalysisRequest, CancelOutcome, CancellationController, CleanupCoordinator,
    ExecutionPipeline,
};

/// Result of a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Entry registered and pipeline dispatched.
    Accepted,
    /// A task with this id is already live; nothing was changed.
    AlreadyRunning,
}

/// The task lifecycle manager.
///
/// Owns the registry and wires the pipeline, cancellation controller, and
/// cleanup coordinator around it. Transport layers (HTTP, tests) only ever
/// talk to this type.
pub struct Runner {
    registry: Arc<TaskRegistry>,
    reporter: Arc<dyn StatusReporter>,
    pipeline: Arc<ExecutionPipeline>,
    cancellation: CancellationController,
    cleanup: Arc<CleanupCoordinator>,
    permits: Arc<Semaphore>,
    metrics_dir: PathBuf,
}

impl Runner {
    /// Assemble a runner from configuration and a status reporter.
    pub fn new(config: &Config, reporter: Arc<dyn StatusReporter>) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let repos = RepositoryService::new(&config.storage.repos_dir);
        let packages = PackageService::new(&config.collector.python_bin);

        let cleanup = Arc::new(CleanupCoordinator::new(
            repos.clone(),
            packages.clone(),
            config.storage.metrics_dir.clone(),
            Arc::clone(&reporter),
        ));
        let pipeline = Arc::new(ExecutionPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&reporter),
            repos,
            packages,
            config,
        ));
        let cancellation = CancellationController::new(
            Arc::clone(&registry),
            Arc::clone(&reporter),
            Arc::clone(&cleanup),
            Duration::from_secs(config.timeouts.cancel_grace_secs),
        );

        Self {
            registry,
            reporter,
            pipeline,
            cancellation,
            cleanup,
            permits: Arc::new(Semaphore::new(config.limits.max_concurrent_tasks.max(1))),
            metrics_dir: config.storage.metrics_dir.clone(),
        }
    }

    /// Accept a task and dispatch its pipeline as a background unit of work.
    ///
    /// Duplicate ids are rejected without touching the existing entry. The
    /// `running` report to the ledger happens before dispatch; if the ledger
    /// rejects it, the task is not started and the entry is withdrawn.
    ///
    /// Dispatch is gated by a semaphore sized to `max_concurrent_tasks`;
    /// accepted tasks beyond the limit queue for a permit before any
    /// provisioning begins.
    pub async fn create(&self, request: AnalysisRequest) -> Result<CreateOutcome> {
        if let RegisterOutcome::AlreadyRunning(status) = self
            .registry
            .register(&request.task_id, &request.analyzer_name)
        {
            info!(task_id = %request.task_id, %status, "Task already registered");
            return Ok(CreateOutcome::AlreadyRunning);
        }

        if !self
            .reporter
            .report(&request.task_id, TaskStatus::Running, None, None)
            .await
        {
            self.registry.remove(&request.task_id);
            bail!("failed to update task status in ledger");
        }

        info!(
            task_id = %request.task_id,
            analyzer = %request.analyzer_name,
            repository = %request.repository_url,
            "Task accepted"
        );

        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // The semaphore is never closed while the runner lives.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            pipeline.run(request).await;
        });

        Ok(CreateOutcome::Accepted)
    }

    /// Cancel a running task. See [`CancellationController::cancel`].
    pub async fn cancel(&self, task_id: &str) -> CancelOutcome {
        self.cancellation.cancel(task_id).await
    }

    /// Fire-and-forget resource cleanup for `task_id`.
    ///
    /// Removes the registry entry (if still live) to capture the analyzer
    /// name, then runs the cleanup coordinator in the background. Always
    /// accepted.
    pub fn request_cleanup(&self, task_id: &str) {
        let analyzer_name = self
            .registry
            .remove(task_id)
            .map(|entry| entry.analyzer_name);
        let cleanup = Arc::clone(&self.cleanup);
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            cleanup.run(&task_id, analyzer_name.as_deref()).await;
        });
    }

    /// Path the metrics artifact for `task_id` would live at.
    pub fn metrics_path(&self, task_id: &str) -> PathBuf {
        metrics_file_path(&self.metrics_dir, task_id)
    }

    /// Shared registry, for observability and tests.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// The status reporter this runner reports through.
    pub fn reporter(&self) -> &Arc<dyn StatusReporter> {
        &self.reporter
    }
}
