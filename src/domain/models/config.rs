//! Runner configuration model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level runner configuration.
///
/// Defaults mirror the production deployment; every field can be overridden
/// via `runner.yaml` or `RUNNER_`-prefixed environment variables (see
/// [`crate::infrastructure::config::ConfigLoader`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// On-disk locations for cloned repositories and metrics artifacts.
    pub storage: StorageConfig,
    /// External metrics-collector binary and tool-provisioning interpreter.
    pub collector: CollectorConfig,
    /// Operation timeouts.
    pub timeouts: TimeoutConfig,
    /// External task ledger endpoint.
    pub ledger: LedgerConfig,
    /// Concurrency limits.
    pub limits: LimitsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Data directories. Repositories land in `repos_dir/<task_id>` and metrics
/// in `metrics_dir/metrics_<task_id>.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root data directory.
    pub data_dir: PathBuf,
    /// Task-scoped repository checkouts.
    pub repos_dir: PathBuf,
    /// Metrics CSV artifacts.
    pub metrics_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            repos_dir: PathBuf::from("data/repos"),
            metrics_dir: PathBuf::from("data/metrics"),
        }
    }
}

/// Paths to external tooling the pipeline shells out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Compiled metrics-collector binary.
    pub binary_path: PathBuf,
    /// Python interpreter used for `pip install`/`pip uninstall`.
    pub python_bin: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("/usr/local/bin/metrics-collector"),
            python_bin: "python3".to_string(),
        }
    }
}

/// Operation timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound on one collector run.
    pub analyze_secs: u64,
    /// Grace window between SIGTERM and SIGKILL during cancellation.
    pub cancel_grace_secs: u64,
    /// Per-request timeout for ledger status updates.
    pub ledger_request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            analyze_secs: 3600,
            cancel_grace_secs: 5,
            ledger_request_secs: 10,
        }
    }
}

/// External task ledger endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Base URL of the ledger API, without trailing slash.
    pub base_url: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api:8000/api/v1".to_string(),
        }
    }
}

/// Concurrency limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of pipelines provisioning/executing at once. Additional
    /// accepted tasks queue for a permit.
    pub max_concurrent_tasks: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 2,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    pub level: String,
    /// Output format: `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
