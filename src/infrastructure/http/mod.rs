//! Thin HTTP surface over the runner's lifecycle operations.
//!
//! One route per operation plus a health probe; all task semantics live in
//! [`Runner`], and the handlers only translate between HTTP and its outcomes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::application::{AnalysisRequest, CancelOutcome, CreateOutcome, Runner};

type SharedRunner = Arc<Runner>;

/// Body of `POST /tasks`.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    /// Opaque unique task id, supplied by the ledger.
    pub task_id: String,
    /// Analyzer package to measure.
    pub analyzer_name: String,
    /// Git URL of the repository to analyze.
    pub repository_url: String,
    /// Command template forwarded to the collector.
    #[serde(default = "default_command_template")]
    pub command_template: String,
    /// Measurement iterations.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_command_template() -> String {
    "{analyzer_cmd} {path}".to_string()
}

fn default_iterations() -> u32 {
    100
}

/// Body of the `POST /tasks/{id}/cancel` response.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// Task the cancel request addressed.
    pub task_id: String,
    /// One of `cancelled`, `not_found`, `not_running`, `error`.
    pub status: String,
    /// Human-readable detail.
    pub message: String,
}

/// Build the runner's HTTP router.
pub fn router(runner: SharedRunner) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", post(create_task))
        .route("/tasks/:task_id/metrics", get(get_metrics))
        .route("/tasks/:task_id/cleanup", post(request_cleanup))
        .route("/tasks/:task_id/cancel", post(cancel_task))
        .with_state(runner)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_task(
    State(runner): State<SharedRunner>,
    Json(body): Json<CreateTaskRequest>,
) -> Response {
    let task_id = body.task_id.clone();
    let request = AnalysisRequest {
        task_id: body.task_id,
        analyzer_name: body.analyzer_name,
        repository_url: body.repository_url,
        command_template: body.command_template,
        iterations: body.iterations,
    };

    match runner.create(request).await {
        Ok(CreateOutcome::Accepted) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "accepted", "task_id": task_id })),
        )
            .into_response(),
        Ok(CreateOutcome::AlreadyRunning) => {
            Json(json!({ "status": "already_running", "task_id": task_id })).into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": format!("Failed to process task: {err:#}") })),
        )
            .into_response(),
    }
}

async fn get_metrics(State(runner): State<SharedRunner>, Path(task_id): Path<String>) -> Response {
    let path = runner.metrics_path(&task_id);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"metrics_{task_id}.csv\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Metrics file not found" })),
        )
            .into_response(),
    }
}

async fn request_cleanup(
    State(runner): State<SharedRunner>,
    Path(task_id): Path<String>,
) -> Json<serde_json::Value> {
    runner.request_cleanup(&task_id);
    Json(json!({ "status": "cleanup_initiated", "task_id": task_id }))
}

async fn cancel_task(
    State(runner): State<SharedRunner>,
    Path(task_id): Path<String>,
) -> Json<CancelResponse> {
    let (status, message) = match runner.cancel(&task_id).await {
        CancelOutcome::Cancelled => (
            "cancelled",
            "Task has been successfully cancelled".to_string(),
        ),
        CancelOutcome::NotFound => ("not_found", "Task not found or already completed".to_string()),
        CancelOutcome::NotRunning => ("not_running", "Task process is not running".to_string()),
        CancelOutcome::Error(err) => ("error", format!("Failed to cancel task: {err}")),
    };
    Json(CancelResponse {
        task_id,
        status: status.to_string(),
        message,
    })
}
