//! Queue actor owning the submission FIFO.
//!
//! Jobs are handed to idle workers in submission order. With a single worker
//! this is a strict global FIFO; with several, each worker still sees its own
//! jobs in order but there is no ordering across workers.

use std::collections::VecDeque;

use queue_core::JobId;
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::messages::{QueueMessage, WorkerMessage};

/// An idle worker waiting for a job.
struct IdleWorker {
    worker_id: String,
    worker: ActorRef<WorkerMessage>,
}

/// State for the queue actor.
#[derive(Default)]
pub struct QueueActorState {
    /// Identifiers waiting for a worker, oldest first.
    pending: VecDeque<JobId>,
    /// Workers waiting for a job, longest idle first.
    idle: VecDeque<IdleWorker>,
}

impl QueueActorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand `job_id` to the first idle worker that is still alive.
    ///
    /// Gives the identifier back if nobody could take it.
    fn dispatch(&mut self, job_id: JobId) -> Option<JobId> {
        while let Some(idle) = self.idle.pop_front() {
            match idle.worker.send_message(WorkerMessage::ProcessJob { job_id }) {
                Ok(()) => {
                    tracing::debug!("Dispatched job {} to {}", job_id, idle.worker_id);
                    return None;
                }
                Err(_) => {
                    tracing::warn!("Dropping unreachable worker {}", idle.worker_id);
                }
            }
        }
        Some(job_id)
    }
}

/// Queue actor that feeds workers.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting queue actor");
        Ok(QueueActorState::new())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if !state.pending.is_empty() {
            tracing::warn!(
                "Queue actor stopped with {} undispatched jobs",
                state.pending.len()
            );
        }
        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Enqueue { job_id } => {
                if let Some(job_id) = state.dispatch(job_id) {
                    state.pending.push_back(job_id);
                    tracing::debug!(
                        "Job {} waiting (queue size: {})",
                        job_id,
                        state.pending.len()
                    );
                }
            }

            QueueMessage::WorkerReady { worker_id, worker } => {
                state.idle.push_back(IdleWorker { worker_id, worker });
                if let Some(job_id) = state.pending.pop_front()
                    && let Some(job_id) = state.dispatch(job_id)
                {
                    state.pending.push_front(job_id);
                }
            }

            QueueMessage::PendingCount { reply } => {
                let _ = reply.send(state.pending.len());
            }
        }

        Ok(())
    }
}
