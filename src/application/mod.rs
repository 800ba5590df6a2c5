//! Application layer: task lifecycle orchestration.

pub mod cancel;
pub mod cleanup;
pub mod pipeline;
pub mod runner;

use std::path::{Path, PathBuf};

pub use cancel::{CancelOutcome, CancellationController};
pub use cleanup::CleanupCoordinator;
pub use pipeline::{AnalysisRequest, ExecutionPipeline};
pub use runner::{CreateOutcome, Runner};

/// Task-scoped metrics artifact path: `<metrics_dir>/metrics_<task_id>.csv`.
pub fn metrics_file_path(metrics_dir: &Path, task_id: &str) -> PathBuf {
    metrics_dir.join(format!("metrics_{task_id}.csv"))
}
