//! HTTP client for the external task ledger.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::Serialize;
use tracing::{debug, error};

use crate::domain::models::TaskStatus;
use crate::domain::ports::StatusReporter;

/// Status-update payload for the ledger's internal endpoint.
#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    status: TaskStatus,
    error: Option<&'a str>,
    metrics_file: Option<&'a str>,
}

/// Reports task status transitions to the ledger's internal endpoint.
///
/// Strictly best-effort: a non-200 response or transport failure is logged
/// and surfaced as `false`, never retried. The runner accepts that its local
/// state can diverge from the ledger's view after a failed report.
pub struct LedgerClient {
    http_client: ReqwestClient,
    base_url: String,
}

impl LedgerClient {
    /// Create a client for the ledger at `base_url` (no trailing slash) with
    /// a per-request timeout.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl StatusReporter for LedgerClient {
    async fn report(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<&str>,
        metrics_file: Option<&str>,
    ) -> bool {
        let url = format!("{}/internal/tasks/{}/status", self.base_url, task_id);
        let payload = StatusUpdate {
            status,
            error,
            metrics_file,
        };

        debug!(%url, %status, "Sending status update");
        match self.http_client.post(&url).json(&payload).send().await {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                let code = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(task_id, %status, %code, body = %body, "Ledger rejected status update");
                false
            }
            Err(err) => {
                error!(task_id, %status, error = %err, "Failed to reach ledger");
                false
            }
        }
    }
}
