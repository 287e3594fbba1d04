//! HTTP surface for the job queue.
//!
//! - Job routes (submit, list, status, result, cancel)
//! - Real-time events (SSE streaming)
//! - Health check

mod error;
mod jobs;
mod realtime;
mod views;

use std::sync::Arc;

use actors::JobQueue;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

pub use error::ApiError;
pub use realtime::sse_event;
pub use views::{CancelResponse, HealthResponse, JobView, SubmitResponse};

/// GET /health
async fn health(State(queue): State<Arc<JobQueue>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        stats: queue.stats(),
    })
}

/// Build the full application router.
pub fn router(queue: Arc<JobQueue>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(jobs::router())
        .merge(realtime::router())
        .with_state(queue)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actors::{ArtifactRef, FnProcessor, JobContext, ProcessError, ProcessFuture};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use bytes::Bytes;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    fn process(ctx: JobContext) -> ProcessFuture {
        Box::pin(async move {
            let params = ctx.params().clone();
            if let Some(message) = params.get("fail").and_then(Value::as_str) {
                return Err(ProcessError::Failed(message.to_string()));
            }
            if params.get("hold").is_some() {
                ctx.set_progress(5);
                loop {
                    ctx.checkpoint()?;
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
            ctx.set_steps(1, 1);
            ctx.set_progress(100);
            let artifact = ctx
                .storage()
                .put(&format!("audio/{}.wav", ctx.id()), Bytes::from_static(b"RIFF"))
                .await?;
            Ok::<ArtifactRef, ProcessError>(artifact)
        })
    }

    async fn app() -> (Router, Arc<JobQueue>) {
        let queue = JobQueue::builder(FnProcessor::new(process))
            .start()
            .await
            .unwrap();
        let queue = Arc::new(queue);
        (router(queue.clone()), queue)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        };
        app.clone().oneshot(request.unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn submit(app: &Router, params: Value) -> String {
        let response = send(app, "POST", "/jobs", Some(params)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        body["job_id"].as_str().unwrap().to_string()
    }

    async fn wait_for_status(app: &Router, id: &str, status: &str) -> Value {
        for _ in 0..1000 {
            let response = send(app, "GET", &format!("/jobs/{id}/status"), None).await;
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            if body["status"] == status {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached {status}");
    }

    #[tokio::test]
    async fn submit_poll_and_download() {
        let (app, queue) = app().await;

        let response = send(&app, "POST", "/jobs", Some(json!({ "task": "demo" }))).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        let id = body["job_id"].as_str().unwrap().to_string();
        assert_eq!(body["status"], "queued");
        assert_eq!(body["status_url"], format!("/jobs/{id}/status"));
        assert_eq!(body["result_url"], format!("/jobs/{id}/result"));

        let status = wait_for_status(&app, &id, "completed").await;
        assert_eq!(status["progress"], 100);
        assert_eq!(status["output_available"], true);
        assert_eq!(status["output_format"], "wav");
        assert_eq!(status["file_size_bytes"], 4);
        assert!(status["duration_sec"].is_number());

        let response = send(&app, "GET", &format!("/jobs/{id}/result"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"{id}.wav\"").as_str()
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"RIFF");

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn rejects_bad_submissions() {
        let (app, queue) = app().await;

        let response = send(&app, "POST", "/jobs", Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());

        let request = Request::builder()
            .method("POST")
            .uri("/jobs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let (app, queue) = app().await;
        let unknown = actors::JobId::new().to_string();

        for uri in [
            format!("/jobs/{unknown}/status"),
            format!("/jobs/{unknown}/result"),
            "/jobs/not-an-id/status".to_string(),
        ] {
            let response = send(&app, "GET", &uri, None).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert!(json_body(response).await["error"].is_string());
        }
        let response = send(&app, "DELETE", &format!("/jobs/{unknown}"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn failed_job_result_carries_the_error() {
        let (app, queue) = app().await;

        let id = submit(&app, json!({ "fail": "synthesis error" })).await;
        let status = wait_for_status(&app, &id, "failed").await;
        assert_eq!(status["error"], "synthesis error");
        assert_eq!(status["output_available"], false);

        let response = send(&app, "GET", &format!("/jobs/{id}/result"), None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["error"],
            "Processing failed: synthesis error"
        );

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn cancel_running_job_over_http() {
        let (app, queue) = app().await;

        let id = submit(&app, json!({ "hold": true })).await;
        wait_for_status(&app, &id, "running").await;

        let response = send(&app, "GET", &format!("/jobs/{id}/result"), None).await;
        assert_eq!(response.status(), StatusCode::TOO_EARLY);

        let response = send(&app, "DELETE", &format!("/jobs/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["job_id"], id.as_str());
        assert_eq!(body["message"], "Cancellation requested");

        wait_for_status(&app, &id, "cancelled").await;
        let response = send(&app, "GET", &format!("/jobs/{id}/result"), None).await;
        assert_eq!(response.status(), StatusCode::GONE);

        let response = send(&app, "DELETE", &format!("/jobs/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let (app, queue) = app().await;

        let done = submit(&app, json!({ "task": "demo" })).await;
        wait_for_status(&app, &done, "completed").await;
        let failed = submit(&app, json!({ "fail": "nope" })).await;
        wait_for_status(&app, &failed, "failed").await;

        let all = json_body(send(&app, "GET", "/jobs", None).await).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        assert_eq!(all[0]["job_id"], done.as_str());

        let completed = json_body(send(&app, "GET", "/jobs?status=completed", None).await).await;
        let completed = completed.as_array().unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0]["job_id"], done.as_str());

        let response = send(&app, "GET", "/jobs?status=bogus", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn health_reports_stats_and_shutdown_refuses_work() {
        let (app, queue) = app().await;

        let id = submit(&app, json!({ "task": "demo" })).await;
        wait_for_status(&app, &id, "completed").await;

        let body = json_body(send(&app, "GET", "/health", None).await).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["stats"]["completed"], 1);

        queue.shutdown().await;
        let response = send(&app, "POST", "/jobs", Some(json!({ "task": "demo" }))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn sse_events_carry_the_event_tag() {
        let event = actors::JobEvent::JobQueued {
            job_id: actors::JobId::new(),
            timestamp: chrono::Utc::now(),
        };
        assert!(sse_event(&event).is_some());
    }
}
