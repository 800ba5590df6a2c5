//! Domain layer: task model, configuration, errors, and ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{RunnerError, RunnerResult};
pub use models::{Config, ProcessHandle, TaskEntry, TaskStatus};
pub use ports::StatusReporter;
