//! Analyzer package provisioning via pip.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{error, info};

/// Analyzers pre-installed in the runner image. Install and uninstall are
/// skipped for these.
pub const BUILTIN_ANALYZERS: [&str; 3] = ["ruff", "black", "flake8"];

/// Whether `name` is one of the pre-installed baseline analyzers.
pub fn is_builtin_analyzer(name: &str) -> bool {
    BUILTIN_ANALYZERS.contains(&name)
}

/// Installs and uninstalls analyzer packages through `pip`.
#[derive(Debug, Clone)]
pub struct PackageService {
    python_bin: String,
}

impl PackageService {
    /// Create a service that shells out to `python_bin -m pip`.
    pub fn new(python_bin: impl Into<String>) -> Self {
        Self {
            python_bin: python_bin.into(),
        }
    }

    /// Install `package_name`, skipping built-ins.
    ///
    /// Surfaces pip's stderr text on nonzero exit.
    pub async fn install(&self, package_name: &str) -> Result<()> {
        if is_builtin_analyzer(package_name) {
            info!(package = package_name, "Analyzer is pre-installed, skipping install");
            return Ok(());
        }

        info!(package = package_name, "Installing analyzer package");
        let output = self
            .pip(&["install", package_name])
            .await
            .with_context(|| format!("failed to run pip install for {package_name}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                "Unknown error during package installation".to_string()
            } else {
                stderr.trim().to_string()
            };
            bail!("{message}");
        }

        info!(package = package_name, "Analyzer package installed");
        Ok(())
    }

    /// Uninstall `package_name`. Failures are logged, not propagated; the
    /// return value says whether pip succeeded.
    pub async fn uninstall(&self, package_name: &str) -> bool {
        info!(package = package_name, "Uninstalling analyzer package");
        match self.pip(&["uninstall", "-y", package_name]).await {
            Ok(output) if output.status.success() => {
                info!(package = package_name, "Analyzer package uninstalled");
                true
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                error!(
                    package = package_name,
                    stderr = %stderr.trim(),
                    "pip uninstall failed"
                );
                false
            }
            Err(err) => {
                error!(package = package_name, error = %err, "failed to run pip uninstall");
                false
            }
        }
    }

    async fn pip(&self, args: &[&str]) -> std::io::Result<std::process::Output> {
        Command::new(&self.python_bin)
            .arg("-m")
            .arg("pip")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_matches_baseline_analyzers() {
        assert!(is_builtin_analyzer("ruff"));
        assert!(is_builtin_analyzer("black"));
        assert!(is_builtin_analyzer("flake8"));
        assert!(!is_builtin_analyzer("pylint"));
    }

    #[tokio::test]
    async fn install_builtin_is_a_noop() {
        // Interpreter path is bogus on purpose: a built-in must never shell out.
        let service = PackageService::new("/nonexistent/python");
        service.install("black").await.unwrap();
    }

    #[tokio::test]
    async fn install_surfaces_failure_without_stderr() {
        // `false` exits 1 with empty stderr regardless of arguments.
        let service = PackageService::new("false");
        let err = service.install("pylint").await.unwrap_err();
        assert!(err.to_string().contains("Unknown error"));
    }

    #[tokio::test]
    async fn install_succeeds_when_pip_exits_zero() {
        let service = PackageService::new("true");
        service.install("pylint").await.unwrap();
    }

    #[tokio::test]
    async fn uninstall_reports_failure_as_false() {
        let service = PackageService::new("false");
        assert!(!service.uninstall("pylint").await);
    }
}
