//! Domain models.

pub mod config;
pub mod process;
pub mod task;

pub use config::{
    CollectorConfig, Config, LedgerConfig, LimitsConfig, LoggingConfig, ServerConfig,
    StorageConfig, TimeoutConfig,
};
pub use process::ProcessHandle;
pub use task::{TaskEntry, TaskStatus};
