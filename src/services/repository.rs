//! Repository provisioning: shallow clones scoped to one task.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Clones target repositories into task-scoped directories and removes them
/// again on cleanup.
#[derive(Debug, Clone)]
pub struct RepositoryService {
    repos_dir: PathBuf,
}

impl RepositoryService {
    /// Create a service rooted at `repos_dir`.
    pub fn new(repos_dir: impl Into<PathBuf>) -> Self {
        Self {
            repos_dir: repos_dir.into(),
        }
    }

    /// Directory a task's checkout lives in.
    pub fn repo_dir(&self, task_id: &str) -> PathBuf {
        self.repos_dir.join(task_id)
    }

    /// Shallow-clone `repository_url` into the task's directory.
    ///
    /// On any failure the partial directory is deleted (best-effort) before
    /// the error is returned.
    pub async fn clone_repository(&self, repository_url: &str, task_id: &str) -> Result<PathBuf> {
        let repo_dir = self.repo_dir(task_id);
        tokio::fs::create_dir_all(&repo_dir)
            .await
            .with_context(|| format!("failed to create {}", repo_dir.display()))?;

        info!(%repository_url, repo_dir = %repo_dir.display(), "Cloning repository");

        let result = Command::new("git")
            .args(["clone", "--depth", "1"])
            .arg(repository_url)
            .arg(&repo_dir)
            .stdin(Stdio::null())
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => {
                info!(%repository_url, "Repository cloned");
                Ok(repo_dir)
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let _ = tokio::fs::remove_dir_all(&repo_dir).await;
                bail!("{}", stderr.trim());
            }
            Err(err) => {
                let _ = tokio::fs::remove_dir_all(&repo_dir).await;
                Err(err).context("failed to run git")
            }
        }
    }

    /// Delete the task's checkout. Absence is not an error.
    pub async fn remove_repository(&self, task_id: &str) -> Result<()> {
        let repo_dir = self.repo_dir(task_id);
        if !repo_dir.exists() {
            debug!(repo_dir = %repo_dir.display(), "Repository directory already absent");
            return Ok(());
        }
        tokio::fs::remove_dir_all(&repo_dir)
            .await
            .with_context(|| format!("failed to remove {}", repo_dir.display()))?;
        info!(repo_dir = %repo_dir.display(), "Repository directory removed");
        Ok(())
    }
}
