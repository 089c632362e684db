//! Task submission and observation endpoints (`spec.md` §4.4).

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use reelforge_core::{PipelineRequest, TaskId, TaskRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_task))
        .route("/{task_id}", get(get_task))
        .route("/{task_id}/wait", get(wait_for_task))
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    task_id: TaskId,
}

async fn submit_task(
    State(state): State<AppState>,
    Json(request): Json<PipelineRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let task_id = state.jobs.submit(request).await?;
    Ok(Json(SubmitResponse { task_id }))
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> Result<Json<TaskRecord>, ApiError> {
    let record = state
        .jobs
        .get_task(task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("task not found".to_string()))?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
struct WaitQuery {
    timeout_secs: Option<f64>,
}

async fn wait_for_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Query(query): Query<WaitQuery>,
) -> Result<Json<TaskRecord>, ApiError> {
    let timeout = query.timeout_secs.map(Duration::from_secs_f64);
    let record = state.jobs.wait_for_completion(task_id, timeout).await?;
    Ok(Json(record))
}
