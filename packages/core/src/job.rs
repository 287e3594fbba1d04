//! Job domain types for work items in the queue.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::QueueError;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque locator for the output a completed job produced.
///
/// The queue never interprets it; the storage collaborator resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(pub String);

impl ArtifactRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a job without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Check if the state is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "running" => Ok(JobState::Running),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "cancelled" => Ok(JobState::Cancelled),
            other => Err(QueueError::InvalidInput(format!("unknown job status: {other}"))),
        }
    }
}

/// Current status of a job in its lifecycle.
///
/// The result only exists on `Completed` and the error only on `Failed`,
/// so a record can never carry one without the matching state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a worker.
    #[default]
    Queued,
    /// Job is being executed by a worker.
    Running,
    /// Job finished and produced an artifact.
    Completed { result: ArtifactRef },
    /// Job failed with an error.
    Failed { error: String },
    /// Job was cancelled, either while queued or cooperatively while running.
    Cancelled,
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        match self {
            JobStatus::Queued => JobState::Queued,
            JobStatus::Running => JobState::Running,
            JobStatus::Completed { .. } => JobState::Completed,
            JobStatus::Failed { .. } => JobState::Failed,
            JobStatus::Cancelled => JobState::Cancelled,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        self.state().as_str()
    }
}

/// Rejected state machine move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// Outcome of a successful cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelAck {
    /// The job was still queued and is now cancelled.
    Cancelled,
    /// The job is running; the processor will see the flag at its next checkpoint.
    Requested,
}

/// A job is one accepted, trackable unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Current status.
    #[serde(flatten)]
    pub status: JobStatus,
    /// Caller-supplied payload describing the work.
    pub params: Arc<serde_json::Value>,
    /// Percentage 0-100, meaningful while running.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Set by a cancel request, read by the processor at checkpoints.
    #[serde(default)]
    pub cancel_requested: bool,
}

impl Job {
    /// Create a new queued job.
    pub fn new(params: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            params: Arc::new(params),
            progress: 0,
            current_step: None,
            total_steps: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            cancel_requested: false,
        }
    }

    pub fn state(&self) -> JobState {
        self.status.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The artifact reference, present only once completed.
    pub fn result(&self) -> Option<&ArtifactRef> {
        match &self.status {
            JobStatus::Completed { result } => Some(result),
            _ => None,
        }
    }

    /// The failure description, present only once failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Queued -> Running. Resets progress.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(JobState::Running)?;
        self.status = JobStatus::Running;
        self.started_at = Some(now);
        self.progress = 0;
        Ok(())
    }

    /// Running -> Completed. Progress is forced to 100.
    pub fn complete(
        &mut self,
        result: ArtifactRef,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.transition(JobState::Completed)?;
        self.status = JobStatus::Completed { result };
        self.progress = 100;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Running -> Failed.
    pub fn fail(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.transition(JobState::Failed)?;
        self.status = JobStatus::Failed {
            error: error.into(),
        };
        self.completed_at = Some(now);
        Ok(())
    }

    /// Queued or Running -> Cancelled.
    pub fn finish_cancelled(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(JobState::Cancelled)?;
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Apply a cancel request.
    ///
    /// A queued job is cancelled on the spot. A running job only gets its
    /// flag raised; the worker finalizes it once the processor gives up.
    pub fn request_cancel(&mut self, now: DateTime<Utc>) -> Result<CancelAck, QueueError> {
        match self.state() {
            JobState::Queued => {
                self.cancel_requested = true;
                self.status = JobStatus::Cancelled;
                self.completed_at = Some(now);
                Ok(CancelAck::Cancelled)
            }
            JobState::Running => {
                self.cancel_requested = true;
                Ok(CancelAck::Requested)
            }
            state => Err(QueueError::AlreadyTerminal { id: self.id, state }),
        }
    }

    /// Record progress. Ignored unless running; never moves backwards.
    ///
    /// Returns true when the stored value changed.
    pub fn update_progress(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if self.state() != JobState::Running || percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    /// Record sub-task position. Ignored unless running.
    pub fn update_steps(&mut self, current: u32, total: u32) -> bool {
        if self.state() != JobState::Running {
            return false;
        }
        self.current_step = Some(current.min(total));
        self.total_steps = Some(total);
        true
    }

    /// Timestamp the retention TTL is measured from.
    pub fn retention_anchor(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }

    /// Terminal and at least `ttl` old at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_terminal() && now - self.retention_anchor() >= ttl
    }

    /// Time spent running so far, or in total once finished.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        let started = self.started_at?;
        Some(self.completed_at.unwrap_or(now) - started)
    }

    fn transition(&self, to: JobState) -> Result<(), InvalidTransition> {
        let from = self.state();
        let allowed = matches!(
            (from, to),
            (JobState::Queued, JobState::Running)
                | (JobState::Queued, JobState::Cancelled)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Failed)
                | (JobState::Running, JobState::Cancelled)
        );
        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition { from, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(serde_json::json!({ "task": "demo" }), Utc::now())
    }

    #[test]
    fn new_job_is_queued_with_zero_progress() {
        let job = job();
        assert_eq!(job.state(), JobState::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.result().is_none());
        assert!(job.error().is_none());
    }

    #[test]
    fn terminal_states_never_move() {
        let now = Utc::now();
        let mut job = job();
        job.start(now).expect("start");
        job.complete(ArtifactRef::new("out.wav"), now).expect("complete");

        assert!(job.start(now).is_err());
        assert!(job.fail("late", now).is_err());
        assert!(job.finish_cancelled(now).is_err());
        assert_eq!(job.result(), Some(&ArtifactRef::new("out.wav")));
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn progress_is_monotonic_and_only_while_running() {
        let now = Utc::now();
        let mut job = job();
        assert!(!job.update_progress(10));

        job.start(now).expect("start");
        assert!(job.update_progress(40));
        assert!(!job.update_progress(20));
        assert_eq!(job.progress, 40);
        assert!(job.update_progress(250));
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn cancel_queued_finishes_immediately() {
        let now = Utc::now();
        let mut job = job();
        assert_eq!(job.request_cancel(now), Ok(CancelAck::Cancelled));
        assert_eq!(job.state(), JobState::Cancelled);
        assert!(job.cancel_requested);
        assert_eq!(job.completed_at, Some(now));
    }

    #[test]
    fn cancel_running_only_raises_flag() {
        let now = Utc::now();
        let mut job = job();
        job.start(now).expect("start");
        assert_eq!(job.request_cancel(now), Ok(CancelAck::Requested));
        assert_eq!(job.state(), JobState::Running);
        assert!(job.cancel_requested);

        job.finish_cancelled(now).expect("finish");
        assert!(matches!(
            job.request_cancel(now),
            Err(QueueError::AlreadyTerminal {
                state: JobState::Cancelled,
                ..
            })
        ));
    }

    #[test]
    fn expiry_ignores_active_jobs() {
        let now = Utc::now();
        let mut job = job();
        assert!(!job.is_expired(now + Duration::days(30), Duration::zero()));

        job.start(now).expect("start");
        assert!(!job.is_expired(now + Duration::days(30), Duration::zero()));

        job.fail("synthesis error", now).expect("fail");
        assert!(job.is_expired(now, Duration::zero()));
        assert!(!job.is_expired(now, Duration::hours(24)));
        assert!(job.is_expired(now + Duration::hours(24), Duration::hours(24)));
    }

    #[test]
    fn status_serializes_flat() {
        let now = Utc::now();
        let mut job = job();
        job.start(now).expect("start");
        job.fail("synthesis error", now).expect("fail");

        let value = serde_json::to_value(&job).expect("serialize");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "synthesis error");
    }
}
