//! Job routes.
//!
//! - POST   /jobs              submit a job
//! - GET    /jobs              list jobs, optionally `?status=`
//! - GET    /jobs/{id}/status  status view
//! - GET    /jobs/{id}/result  artifact bytes
//! - DELETE /jobs/{id}         cancel

use std::sync::Arc;

use actors::JobQueue;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use queue_core::{JobId, JobState};
use serde::Deserialize;

use crate::error::ApiError;
use crate::views::{CancelResponse, JobView, SubmitResponse};

fn parse_id(raw: &str) -> Result<JobId, ApiError> {
    JobId::parse(raw).map_err(|_| ApiError::NotFound(format!("job not found: {raw}")))
}

/// POST /jobs
async fn submit_job(
    State(queue): State<Arc<JobQueue>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(params) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let job_id = queue.submit(params)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse::new(job_id))))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

/// GET /jobs
async fn list_jobs(
    State(queue): State<Arc<JobQueue>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<JobView>>, ApiError> {
    let filter = query
        .status
        .as_deref()
        .map(str::parse::<JobState>)
        .transpose()?;
    let now = queue.now();
    let jobs = queue
        .list(filter)
        .iter()
        .map(|job| JobView::new(job, now))
        .collect();
    Ok(Json(jobs))
}

/// GET /jobs/{id}/status
async fn job_status(
    State(queue): State<Arc<JobQueue>>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let job = queue.status(parse_id(&id)?)?;
    let mut view = JobView::new(&job, queue.now());
    if let Some(artifact) = job.result() {
        match queue.storage().size(artifact).await {
            Ok(bytes) => view = view.with_file_size(bytes),
            Err(e) => tracing::debug!("No size for artifact {}: {}", artifact, e),
        }
    }
    Ok(Json(view))
}

/// GET /jobs/{id}/result
async fn job_result(
    State(queue): State<Arc<JobQueue>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let artifact = queue.fetch_result(id)?;
    let bytes = queue.storage().get(&artifact).await?;

    let file_name = artifact
        .as_str()
        .rsplit('/')
        .next()
        .unwrap_or(artifact.as_str())
        .to_string();
    tracing::debug!("Serving result of job {} ({} bytes)", id, bytes.len());

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream".to_string())],
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )],
        bytes,
    )
        .into_response())
}

/// DELETE /jobs/{id}
async fn cancel_job(
    State(queue): State<Arc<JobQueue>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let id = parse_id(&id)?;
    let ack = queue.cancel(id)?;
    Ok(Json(CancelResponse::new(id, ack)))
}

/// Build the jobs router.
pub fn router() -> Router<Arc<JobQueue>> {
    Router::new()
        .route("/jobs", post(submit_job).get(list_jobs))
        .route("/jobs/{id}/status", get(job_status))
        .route("/jobs/{id}/result", get(job_result))
        .route("/jobs/{id}", delete(cancel_job))
}
