//! Domain errors for the benchmark runner.

use thiserror::Error;

/// Errors that terminate an analysis task.
///
/// Each variant maps to exactly one `failed` report to the ledger; the
/// pipeline short-circuits on the first error it encounters.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to install analyzer: {0}")]
    ToolInstall(String),

    #[error("Failed to clone repository: {0}")]
    CloneRepository(String),

    #[error("Failed to start metrics collector: {0}")]
    Spawn(String),

    #[error("Analysis timed out after {0} seconds")]
    Timeout(u64),

    #[error("Metrics collector exited with code {code} and no diagnostics: {detail}")]
    Execution { code: i32, detail: String },

    #[error("Metrics file was not created at {0}")]
    MissingMetrics(String),

    #[error("Error during analysis: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for pipeline results.
pub type RunnerResult<T> = Result<T, RunnerError>;
