//! Error types shared by the queue and its callers.

use crate::{JobId, JobState};

/// Errors returned by the caller-facing queue operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The submission was malformed or rejected by the validator.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown identifier, including jobs already swept.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// The result was requested before the job finished.
    #[error("job {id} is not ready (status: {state})")]
    NotReady { id: JobId, state: JobState },

    /// The result was requested for a cancelled job.
    #[error("job {0} was cancelled")]
    Gone(JobId),

    /// The processor reported a failure; carries its message verbatim.
    #[error("{0}")]
    ProcessingFailed(String),

    /// Cancel was requested on a job that already finished.
    #[error("job {id} is already {state}")]
    AlreadyTerminal { id: JobId, state: JobState },

    /// The queue no longer accepts work.
    #[error("job queue is shutting down")]
    ShuttingDown,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}={value}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid queue config: {0}")]
    Invalid(String),
}
