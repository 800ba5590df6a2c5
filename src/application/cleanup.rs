//! Cleanup coordinator: reverses provisioning and deletes artifacts.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, instrument};

use crate::domain::models::TaskStatus;
use crate::domain::ports::StatusReporter;
use crate::services::{is_builtin_analyzer, PackageService, RepositoryService};

use super::metrics_file_path;

/// Reclaims everything a task provisioned: the analyzer package (non-built-ins
/// only), the repository checkout, and the metrics artifact.
///
/// Never propagates errors to its caller; a failure is reported to the ledger
/// as `cleanup_failed` instead.
pub struct CleanupCoordinator {
    repos: RepositoryService,
    packages: PackageService,
    metrics_dir: PathBuf,
    reporter: Arc<dyn StatusReporter>,
}

impl CleanupCoordinator {
    /// Create a coordinator over the provisioning services.
    pub fn new(
        repos: RepositoryService,
        packages: PackageService,
        metrics_dir: PathBuf,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            repos,
            packages,
            metrics_dir,
            reporter,
        }
    }

    /// Clean up all resources for `task_id` and report the result.
    #[instrument(skip(self, analyzer_name))]
    pub async fn run(&self, task_id: &str, analyzer_name: Option<&str>) {
        info!("Cleaning up task resources");
        match self.execute(task_id, analyzer_name).await {
            Ok(()) => {
                self.reporter
                    .report(task_id, TaskStatus::Cleaned, None, None)
                    .await;
                info!("Cleanup finished");
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "Cleanup failed");
                self.reporter
                    .report(
                        task_id,
                        TaskStatus::CleanupFailed,
                        Some(&format!("Cleanup failed: {err:#}")),
                        None,
                    )
                    .await;
            }
        }
    }

    async fn execute(&self, task_id: &str, analyzer_name: Option<&str>) -> Result<()> {
        if let Some(name) = analyzer_name {
            if !is_builtin_analyzer(name) {
                // Best-effort: pip failures are logged by the service.
                self.packages.uninstall(name).await;
            }
        }

        self.repos.remove_repository(task_id).await?;

        let metrics_file = metrics_file_path(&self.metrics_dir, task_id);
        if metrics_file.exists() {
            tokio::fs::remove_file(&metrics_file)
                .await
                .with_context(|| format!("failed to delete {}", metrics_file.display()))?;
            info!(metrics_file = %metrics_file.display(), "Metrics file deleted");
        }

        Ok(())
    }
}
