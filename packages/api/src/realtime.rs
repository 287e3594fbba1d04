//! Real-time job events via Server-Sent Events.

use std::convert::Infallible;
use std::sync::Arc;

use actors::JobQueue;
use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use queue_core::JobEvent;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

/// Format one event for the SSE stream. The JSON carries its own `event` tag.
pub fn sse_event(event: &JobEvent) -> Option<Event> {
    match Event::default().json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::warn!("Dropping unserializable event for job {}: {}", event.job_id(), e);
            None
        }
    }
}

/// GET /jobs/events
async fn stream_events(
    State(queue): State<Arc<JobQueue>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(queue.subscribe()).filter_map(|message| match message {
        Ok(event) => sse_event(&event).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!("Event subscriber lagged, skipped {} events", skipped);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<Arc<JobQueue>> {
    Router::new().route("/jobs/events", get(stream_events))
}
