//! Response bodies.

use chrono::{DateTime, Duration, Utc};
use queue_core::{CancelAck, Job, JobId, JobState, QueueStats};
use serde::{Deserialize, Serialize};

/// Status of one job as shown to HTTP clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobState,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds since start, frozen once the job finishes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_sec: Option<f64>,
    /// Seconds from start to finish; only for jobs that ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub output_available: bool,
    /// Extension of the artifact, e.g. `wav`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
}

impl JobView {
    pub fn new(job: &Job, now: DateTime<Utc>) -> Self {
        let elapsed = job.elapsed(now);
        Self {
            job_id: job.id,
            status: job.state(),
            progress: job.progress,
            current_step: job.current_step,
            total_steps: job.total_steps,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            elapsed_sec: elapsed.map(seconds),
            duration_sec: job.completed_at.and(elapsed).map(seconds),
            error: job.error().map(str::to_string),
            output_available: job.result().is_some(),
            output_format: job.result().and_then(|a| output_format(a.as_str())),
            file_size_bytes: None,
        }
    }

    pub fn with_file_size(mut self, bytes: u64) -> Self {
        self.file_size_bytes = Some(bytes);
        self
    }
}

fn output_format(key: &str) -> Option<String> {
    let name = key.rsplit('/').next().unwrap_or(key);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

fn seconds(d: Duration) -> f64 {
    d.num_milliseconds().max(0) as f64 / 1000.0
}

/// Body of `202 Accepted` for a new job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobState,
    pub status_url: String,
    pub result_url: String,
}

impl SubmitResponse {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobState::Queued,
            status_url: format!("/jobs/{job_id}/status"),
            result_url: format!("/jobs/{job_id}/result"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub message: String,
}

impl CancelResponse {
    pub fn new(job_id: JobId, ack: CancelAck) -> Self {
        let message = match ack {
            CancelAck::Cancelled => "Job cancelled",
            CancelAck::Requested => "Cancellation requested",
        };
        Self {
            job_id,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub stats: QueueStats,
}
