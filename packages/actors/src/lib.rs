//! Actor system for the background job queue.
//!
//! This crate provides the Ractor-based engine behind [`JobQueue`]:
//! the job store, the submission FIFO, the workers and the retention sweeper.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor that owns and restarts the others
//! - `QueueActor` - Submission FIFO, hands job ids to idle workers
//! - `WorkerActor` - Runs one job at a time through the [`Processor`]
//! - `SweeperActor` - Periodically evicts finished jobs past their TTL
//!
//! # Usage
//!
//! ```ignore
//! use actors::{FnProcessor, JobQueue};
//!
//! let queue = JobQueue::builder(FnProcessor::new(|ctx| {
//!     Box::pin(async move {
//!         ctx.set_progress(50);
//!         ctx.checkpoint()?;
//!         Ok(ArtifactRef::new(format!("{}.wav", ctx.id())))
//!     })
//! }))
//! .start()
//! .await?;
//!
//! let id = queue.submit(serde_json::json!({ "task": "demo" }))?;
//! let job = queue.status(id)?;
//! ```

mod job_queue;
mod messages;
mod processor;
mod queue_actor;
mod shared;
mod store;
mod supervisor;
mod sweeper;
mod worker_actor;

pub use job_queue::{JobQueue, JobQueueBuilder, StartError, Validator};
pub use processor::{FnProcessor, JobContext, ProcessError, ProcessFuture, ProcessResult, Processor};
pub use store::{JobSlot, JobStore};
pub use worker_actor::INTERNAL_FAULT;

/// Re-export the core types callers need alongside the queue.
pub use queue_core::{
    ArtifactRef, CancelAck, Job, JobEvent, JobId, JobState, JobStatus, QueueConfig, QueueError,
    QueueStats,
};
