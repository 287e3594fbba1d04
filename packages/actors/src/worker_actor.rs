//! Worker actor for executing jobs.

use std::sync::Arc;

use queue_core::{ArtifactRef, JobEvent, JobId, JobState};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::messages::{QueueMessage, WorkerMessage};
use crate::processor::{JobContext, ProcessError, Processor};
use crate::shared::Shared;

/// Error recorded when a processor panics instead of returning.
pub const INTERNAL_FAULT: &str = "internal fault: processor panicked";

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID.
    pub worker_id: String,
    /// Queue actor reference.
    pub queue: ActorRef<QueueMessage>,
    /// The processor every job is handed to.
    pub processor: Arc<dyn Processor>,
    shared: Arc<Shared>,
}

impl WorkerActorState {
    fn report_ready(&self, myself: &ActorRef<WorkerMessage>) {
        let ready = QueueMessage::WorkerReady {
            worker_id: self.worker_id.clone(),
            worker: myself.clone(),
        };
        if self.queue.send_message(ready).is_err() {
            tracing::debug!(worker = %self.worker_id, "queue is gone, not asking for more work");
        }
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: ActorRef<QueueMessage>,
    pub processor: Arc<dyn Processor>,
    pub(crate) shared: Arc<Shared>,
}

/// Worker actor that executes jobs one at a time.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);
        Ok(WorkerActorState {
            worker_id: args.worker_id,
            queue: args.queue,
            processor: args.processor,
            shared: args.shared,
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.report_ready(&myself);
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!("Worker {} stopped", state.worker_id);
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::ProcessJob { job_id } => {
                run_job(state, job_id).await;
                state.report_ready(&myself);
            }
        }

        Ok(())
    }
}

/// Start, run and finalize one job. Never fails: every outcome, including a
/// panic inside the processor, ends up recorded on the job.
async fn run_job(state: &WorkerActorState, job_id: JobId) {
    let shared = &state.shared;

    let Some(slot) = shared.store.slot(job_id) else {
        tracing::warn!("Job {} not found in job store", job_id);
        return;
    };

    let started_at = shared.clock.now();
    let ctx = {
        let mut job = slot.lock();
        if job.state() != JobState::Queued {
            tracing::info!("Skipping job {} ({})", job_id, job.state());
            return;
        }
        if let Err(e) = job.start(started_at) {
            tracing::warn!("Job {} could not start: {}", job_id, e);
            return;
        }
        JobContext::new(job_id, job.params.clone(), slot.clone(), shared.clone())
    };

    tracing::info!("Processing job {} on {}", job_id, state.worker_id);
    shared.broadcast(JobEvent::JobStarted {
        job_id,
        worker_id: state.worker_id.clone(),
        timestamp: started_at,
    });

    // The processor runs on its own task so a panic surfaces as a JoinError
    // instead of taking the worker down.
    let processor = state.processor.clone();
    let outcome = tokio::spawn(async move { processor.process(ctx).await }).await;

    // Drop the output of a cancelled job before the cancel becomes visible.
    let cancel_seen = slot.lock().cancel_requested;
    if cancel_seen && let Ok(Ok(artifact)) = &outcome {
        discard_artifact(shared, artifact, job_id).await;
    }

    let now = shared.clock.now();
    let mut discarded = None;
    let (event, transition) = {
        let mut job = slot.lock();
        match outcome {
            // An acknowledged cancel wins over a late success.
            Ok(Ok(result)) if job.cancel_requested => {
                if !cancel_seen {
                    discarded = Some(result);
                }
                let transition = job.finish_cancelled(now);
                let event = JobEvent::JobCancelled {
                    job_id,
                    from: JobState::Running,
                    timestamp: now,
                };
                (event, transition)
            }
            Ok(Ok(result)) => {
                let duration_ms = (now - started_at).num_milliseconds().max(0) as u64;
                let transition = job.complete(result.clone(), now);
                let event = JobEvent::JobCompleted {
                    job_id,
                    result,
                    duration_ms,
                    timestamp: now,
                };
                (event, transition)
            }
            Ok(Err(ProcessError::Failed(error))) => {
                let transition = job.fail(error.clone(), now);
                let event = JobEvent::JobFailed {
                    job_id,
                    error,
                    timestamp: now,
                };
                (event, transition)
            }
            Ok(Err(ProcessError::Cancelled)) => {
                let transition = job.finish_cancelled(now);
                let event = JobEvent::JobCancelled {
                    job_id,
                    from: JobState::Running,
                    timestamp: now,
                };
                (event, transition)
            }
            Err(join_err) => {
                tracing::error!("Job {} processor fault: {}", job_id, join_err);
                let transition = job.fail(INTERNAL_FAULT, now);
                let event = JobEvent::JobFailed {
                    job_id,
                    error: INTERNAL_FAULT.to_string(),
                    timestamp: now,
                };
                (event, transition)
            }
        }
    };

    if let Some(artifact) = discarded {
        discard_artifact(shared, &artifact, job_id).await;
    }

    match transition {
        Ok(()) => {
            tracing::info!("{}", event.description());
            shared.broadcast(event);
        }
        Err(e) => tracing::warn!("Job {} not finalized: {}", job_id, e),
    }
}

async fn discard_artifact(shared: &Shared, artifact: &ArtifactRef, job_id: JobId) {
    match shared.storage.delete(artifact).await {
        Ok(()) => tracing::debug!("Discarded artifact {} of cancelled job {}", artifact, job_id),
        Err(e) => tracing::warn!(
            "Failed to discard artifact {} of cancelled job {}: {}",
            artifact,
            job_id,
            e
        ),
    }
}
