//! Hierarchical configuration loader.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrent_tasks: {0}. Must be between 1 and 64")]
    InvalidMaxConcurrentTasks(usize),

    #[error("Invalid analyze timeout: {0}. Must be positive")]
    InvalidAnalyzeTimeout(u64),

    #[error("Invalid cancel grace period: {0}. Must be positive")]
    InvalidGracePeriod(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Ledger base URL cannot be empty")]
    EmptyLedgerUrl,

    #[error("Collector binary path cannot be empty")]
    EmptyCollectorPath,

    #[error("Storage directory cannot be empty: {0}")]
    EmptyStorageDir(&'static str),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `runner.yaml` in the working directory
    /// 3. Environment variables (`RUNNER_` prefix, `__` nesting separator)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("runner.yaml"))
            .merge(Env::prefixed("RUNNER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("RUNNER_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.limits.max_concurrent_tasks == 0 || config.limits.max_concurrent_tasks > 64 {
            return Err(ConfigError::InvalidMaxConcurrentTasks(
                config.limits.max_concurrent_tasks,
            ));
        }

        if config.timeouts.analyze_secs == 0 {
            return Err(ConfigError::InvalidAnalyzeTimeout(
                config.timeouts.analyze_secs,
            ));
        }

        if config.timeouts.cancel_grace_secs == 0 {
            return Err(ConfigError::InvalidGracePeriod(
                config.timeouts.cancel_grace_secs,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.ledger.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyLedgerUrl);
        }

        if config.collector.binary_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCollectorPath);
        }

        if config.storage.repos_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStorageDir("repos_dir"));
        }
        if config.storage.metrics_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStorageDir("metrics_dir"));
        }

        Ok(())
    }
}
