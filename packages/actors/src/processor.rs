//! The processing seam: what actually does the work for a job.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use queue_core::{ArtifactRef, JobEvent, JobId};
use storage::{Storage, StorageError};

use crate::shared::Shared;
use crate::store::JobSlot;

/// Result type for processors.
pub type ProcessResult = Result<ArtifactRef, ProcessError>;

/// Future type for async processors.
pub type ProcessFuture = Pin<Box<dyn Future<Output = ProcessResult> + Send>>;

/// How a processor can end other than by producing an artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    /// The work failed; the message is shown to callers verbatim.
    #[error("{0}")]
    Failed(String),

    /// The processor saw the cancel flag and stopped.
    #[error("cancelled")]
    Cancelled,
}

impl From<String> for ProcessError {
    fn from(message: String) -> Self {
        ProcessError::Failed(message)
    }
}

impl From<&str> for ProcessError {
    fn from(message: &str) -> Self {
        ProcessError::Failed(message.to_string())
    }
}

impl From<StorageError> for ProcessError {
    fn from(e: StorageError) -> Self {
        ProcessError::Failed(e.to_string())
    }
}

/// Trait for job processors.
///
/// A processor gets a [`JobContext`] for each job. It should report progress
/// through it and call [`JobContext::checkpoint`] between sub-steps so a
/// cancel request takes effect. A panic inside the future is caught by the
/// worker and recorded as a failed job.
pub trait Processor: Send + Sync + 'static {
    /// Process a job and return the artifact it produced.
    fn process(&self, ctx: JobContext) -> ProcessFuture;
}

/// A simple function-based processor.
pub struct FnProcessor<F>
where
    F: Fn(JobContext) -> ProcessFuture + Send + Sync + 'static,
{
    handler: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(JobContext) -> ProcessFuture + Send + Sync + 'static,
{
    /// Create a new function-based processor.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> Processor for FnProcessor<F>
where
    F: Fn(JobContext) -> ProcessFuture + Send + Sync + 'static,
{
    fn process(&self, ctx: JobContext) -> ProcessFuture {
        (self.handler)(ctx)
    }
}

/// Handle a processor uses to read its job and report back.
#[derive(Clone)]
pub struct JobContext {
    id: JobId,
    params: Arc<serde_json::Value>,
    slot: Arc<JobSlot>,
    shared: Arc<Shared>,
}

impl JobContext {
    pub(crate) fn new(
        id: JobId,
        params: Arc<serde_json::Value>,
        slot: Arc<JobSlot>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            params,
            slot,
            shared,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn params(&self) -> &serde_json::Value {
        &self.params
    }

    /// Where artifacts should be written.
    pub fn storage(&self) -> &Storage {
        &self.shared.storage
    }

    /// Report overall progress in percent. Values above 100 are clamped and
    /// values below the last report are ignored.
    pub fn set_progress(&self, percent: u8) {
        let event = {
            let mut job = self.slot.lock();
            job.update_progress(percent)
                .then(|| self.progress_event(job.progress, job.current_step, job.total_steps))
        };
        if let Some(event) = event {
            self.shared.broadcast(event);
        }
    }

    /// Report sub-task position, e.g. chunk 3 of 8.
    pub fn set_steps(&self, current: u32, total: u32) {
        let event = {
            let mut job = self.slot.lock();
            job.update_steps(current, total)
                .then(|| self.progress_event(job.progress, job.current_step, job.total_steps))
        };
        if let Some(event) = event {
            self.shared.broadcast(event);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.slot.lock().cancel_requested
    }

    /// Bail out with [`ProcessError::Cancelled`] if a cancel was requested.
    pub fn checkpoint(&self) -> Result<(), ProcessError> {
        if self.is_cancelled() {
            Err(ProcessError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn progress_event(
        &self,
        progress: u8,
        current_step: Option<u32>,
        total_steps: Option<u32>,
    ) -> JobEvent {
        JobEvent::JobProgress {
            job_id: self.id,
            progress,
            current_step,
            total_steps,
            timestamp: self.shared.clock.now(),
        }
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext").field("id", &self.id).finish()
    }
}
