//! Core domain types for the background job queue.
//!
//! This crate contains the types shared by the engine and the HTTP layer:
//! - Job, JobStatus and JobState for tracked work items
//! - QueueConfig and QueueStats for the queue itself
//! - JobEvent for real-time updates
//! - QueueError, the caller-facing error taxonomy
//! - Clock, the injectable time source

mod clock;
mod error;
mod events;
mod job;
mod queue;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, QueueError};
pub use events::JobEvent;
pub use job::{ArtifactRef, CancelAck, InvalidTransition, Job, JobId, JobState, JobStatus};
pub use queue::{QueueConfig, QueueStats};
