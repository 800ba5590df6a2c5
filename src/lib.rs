//! Lintbench Runner - Static-Analyzer Benchmark Runner
//!
//! The runner executes third-party static-analysis tools against arbitrary
//! git repositories and measures their execution timing. It accepts tasks
//! from an external task ledger, provisions each task's environment
//! (analyzer install, shallow clone), runs the external metrics collector
//! under a timeout, supports cooperative cancellation, cleans up resources,
//! and reports status transitions back to the ledger best-effort.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): task model, configuration, errors, ports
//! - **Service Layer** (`services`): task registry and provisioning services
//! - **Application Layer** (`application`): lifecycle orchestration
//! - **Infrastructure Layer** (`infrastructure`): config loading, ledger
//!   client, HTTP transport
//!
//! Task state is held only in memory; it does not survive a restart of the
//! runner process.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{
    AnalysisRequest, CancelOutcome, CancellationController, CleanupCoordinator, CreateOutcome,
    ExecutionPipeline, Runner,
};
pub use domain::models::{Config, ProcessHandle, TaskEntry, TaskStatus};
pub use domain::ports::StatusReporter;
pub use domain::{RunnerError, RunnerResult};
pub use infrastructure::{ConfigError, ConfigLoader, LedgerClient};
pub use services::{PackageService, RepositoryService, TaskRegistry, BUILTIN_ANALYZERS};
