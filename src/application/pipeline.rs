//! Execution pipeline: provision, run the collector, validate, report.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{RunnerError, RunnerResult};
use crate::domain::models::{Config, ProcessHandle, TaskStatus};
use crate::domain::ports::StatusReporter;
use crate::services::{
    is_builtin_analyzer, PackageService, RepositoryService, TaskRegistry, BUILTIN_ANALYZERS,
};

use super::metrics_file_path;

/// Everything the pipeline needs to run one analysis task.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Opaque unique id supplied by the ledger; keys the registry and all
    /// task-scoped artifacts.
    pub task_id: String,
    /// Analyzer package under measurement.
    pub analyzer_name: String,
    /// Git URL of the repository to analyze.
    pub repository_url: String,
    /// Command template forwarded to the collector, e.g.
    /// `{analyzer_cmd} {path}`.
    pub command_template: String,
    /// Number of measurement iterations.
    pub iterations: u32,
}

/// How one pipeline run ended, before the terminal report.
enum PipelineOutcome {
    /// Collector finished and the metrics file validated.
    Completed(PathBuf),
    /// A concurrent cancellation already reported for this task; the pipeline
    /// must stay silent.
    Superseded,
}

/// Orchestrates one task from provisioning through terminal report.
///
/// Every path through [`ExecutionPipeline::run`] ends with an idempotent
/// registry removal, so a task can never leak an entry.
pub struct ExecutionPipeline {
    registry: Arc<TaskRegistry>,
    reporter: Arc<dyn StatusReporter>,
    repos: RepositoryService,
    packages: PackageService,
    collector_path: PathBuf,
    metrics_dir: PathBuf,
    analyze_timeout: Duration,
}

impl ExecutionPipeline {
    /// Build a pipeline from configuration and shared collaborators.
    pub fn new(
        registry: Arc<TaskRegistry>,
        reporter: Arc<dyn StatusReporter>,
        repos: RepositoryService,
        packages: PackageService,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            reporter,
            repos,
            packages,
            collector_path: config.collector.binary_path.clone(),
            metrics_dir: config.storage.metrics_dir.clone(),
            analyze_timeout: Duration::from_secs(config.timeouts.analyze_secs),
        }
    }

    /// Run the task to completion and report the terminal outcome.
    #[instrument(skip_all, fields(task_id = %request.task_id, analyzer = %request.analyzer_name))]
    pub async fn run(&self, request: AnalysisRequest) {
        match self.execute(&request).await {
            Ok(PipelineOutcome::Completed(metrics_file)) => {
                let path = metrics_file.display().to_string();
                info!(metrics_file = %path, "Analysis completed");
                self.reporter
                    .report(&request.task_id, TaskStatus::Completed, None, Some(&path))
                    .await;
            }
            Ok(PipelineOutcome::Superseded) => {
                debug!("Task was cancelled, suppressing terminal report");
            }
            Err(err) => {
                error!(error = %err, "Analysis failed");
                self.reporter
                    .report(&request.task_id, TaskStatus::Failed, Some(&err.to_string()), None)
                    .await;
            }
        }
        // Final action on every path. The cancel/cleanup flow may have gotten
        // here first; remove-if-present makes the race harmless.
        self.registry.remove(&request.task_id);
    }

    async fn execute(&self, request: &AnalysisRequest) -> RunnerResult<PipelineOutcome> {
        // Step 1: tool provisioning (no-op for built-ins).
        self.packages
            .install(&request.analyzer_name)
            .await
            .map_err(|err| RunnerError::ToolInstall(format!("{err:#}")))?;

        // Step 2: repository provisioning.
        let repo_dir = self
            .repos
            .clone_repository(&request.repository_url, &request.task_id)
            .await
            .map_err(|err| RunnerError::CloneRepository(format!("{err:#}")))?;

        // Steps 3-6: collector subprocess and output validation.
        self.collect_metrics(request, &repo_dir).await
    }

    async fn collect_metrics(
        &self,
        request: &AnalysisRequest,
        repo_dir: &Path,
    ) -> RunnerResult<PipelineOutcome> {
        let metrics_file = metrics_file_path(&self.metrics_dir, &request.task_id);

        let mut command = Command::new(&self.collector_path);
        command
            .arg("-target")
            .arg(repo_dir)
            .arg("-iterations")
            .arg(request.iterations.to_string())
            .arg("-output")
            .arg(&metrics_file)
            .arg("-parallel")
            .arg(host_parallelism().to_string())
            .arg("-smart=true")
            .arg("-command-template")
            .arg(&request.command_template);
        if !is_builtin_analyzer(&request.analyzer_name) {
            command.arg("-custom-analyzer").arg(&request.analyzer_name);
            info!(analyzer = %request.analyzer_name, "Custom analyzer enabled");
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!(
            collector = %self.collector_path.display(),
            iterations = request.iterations,
            "Starting metrics collector"
        );
        let mut child = command
            .spawn()
            .map_err(|err| RunnerError::Spawn(err.to_string()))?;

        // Publish the handle so the cancellation controller can reach the
        // process while we wait on it.
        if let Some(pid) = child.id() {
            self.registry
                .set_process(&request.task_id, ProcessHandle::new(pid));
        }

        // Drain both pipes concurrently with the wait; reading after exit
        // risks a pipe-buffer deadlock on chatty collectors.
        let mut stdout_pipe = child.stdout.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let mut stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = match tokio::time::timeout(self.analyze_timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                self.registry.clear_process(&request.task_id);
                return Err(RunnerError::Io(err));
            }
            Err(_elapsed) => {
                warn!(
                    timeout_secs = self.analyze_timeout.as_secs(),
                    "Collector exceeded the analysis timeout, killing it"
                );
                let _ = child.kill().await;
                self.registry.clear_process(&request.task_id);
                return Err(RunnerError::Timeout(self.analyze_timeout.as_secs()));
            }
        };
        self.registry.clear_process(&request.task_id);

        // A concurrent cancellation may have interrupted the wait. If it
        // marked the entry, it also reported; do not report again.
        if matches!(
            self.registry.status(&request.task_id),
            Some(TaskStatus::Cancelling | TaskStatus::Cancelled)
        ) {
            return Ok(PipelineOutcome::Superseded);
        }

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let stdout_text = String::from_utf8_lossy(&stdout);
        let stderr_text = String::from_utf8_lossy(&stderr);

        debug!(stdout = %stdout_text.trim(), "Collector output");
        if !stderr_text.trim().is_empty() {
            // Analyzers write their findings to stderr; a nonzero exit paired
            // with stderr output is an expected result, not a failure.
            warn!(stderr = %stderr_text.trim(), "Collector reported analyzer diagnostics");
        }

        if !status.success() && stderr_text.trim().is_empty() {
            let code = status.code().unwrap_or(-1);
            return Err(RunnerError::Execution {
                code,
                detail: diagnostic_tail(&stdout_text),
            });
        }

        if !metrics_file.exists() {
            return Err(RunnerError::MissingMetrics(
                metrics_file.display().to_string(),
            ));
        }

        let data_rows = count_data_rows(&metrics_file).await?;
        let expected = request.iterations as usize * BUILTIN_ANALYZERS.len();
        if data_rows < expected {
            warn!(
                data_rows,
                expected, "Metrics row count below expectation"
            );
        }
        info!(data_rows, "Metrics file validated");

        Ok(PipelineOutcome::Completed(metrics_file))
    }
}

/// Parallelism hint for the collector: 1 on a single-core host, otherwise 2.
/// Capped at 2 regardless of higher core counts.
fn host_parallelism() -> u32 {
    match std::thread::available_parallelism() {
        Ok(n) if n.get() > 1 => 2,
        _ => 1,
    }
}

/// Last portion of the collector's stdout, kept as the diagnostic when it
/// exits nonzero without writing anything to stderr.
fn diagnostic_tail(stdout: &str) -> String {
    const MAX_TAIL: usize = 512;
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return "<no output>".to_string();
    }
    if trimmed.len() <= MAX_TAIL {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_TAIL;
    while start < trimmed.len() && !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

/// Data rows in the metrics CSV, excluding the header line.
async fn count_data_rows(path: &Path) -> std::io::Result<usize> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(contents.lines().count().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallelism_is_capped_at_two() {
        let parallelism = host_parallelism();
        assert!(parallelism == 1 || parallelism == 2);
    }

    #[test]
    fn diagnostic_tail_handles_empty_output() {
        assert_eq!(diagnostic_tail("  \n"), "<no output>");
    }

    #[test]
    fn diagnostic_tail_truncates_long_output() {
        let long = "x".repeat(2000);
        let tail = diagnostic_tail(&long);
        assert!(tail.starts_with("..."));
        assert_eq!(tail.len(), 512 + 3);
    }

    #[tokio::test]
    async fn count_data_rows_excludes_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metrics.csv");
        tokio::fs::write(&path, "analyzer,iteration,seconds\nruff,0,0.1\nblack,0,0.2\n")
            .await
            .unwrap();
        assert_eq!(count_data_rows(&path).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn count_data_rows_of_header_only_file_is_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metrics.csv");
        tokio::fs::write(&path, "analyzer,iteration,seconds\n").await.unwrap();
        assert_eq!(count_data_rows(&path).await.unwrap(), 0);
    }
}
