//! Supervisor actor owning the queue, the workers and the sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ractor::{Actor, ActorCell, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::task::JoinHandle;

use crate::messages::{QueueMessage, SupervisorMessage, SweeperMessage, WorkerMessage};
use crate::processor::Processor;
use crate::queue_actor::QueueActor;
use crate::shared::Shared;
use crate::sweeper::{SweeperActor, SweeperArgs};
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Supervisor actor arguments.
pub struct SupervisorArgs {
    pub workers: u32,
    pub sweep_interval: Duration,
    pub processor: Arc<dyn Processor>,
    pub(crate) shared: Arc<Shared>,
}

struct Child<M: ractor::Message> {
    actor: ActorRef<M>,
    handle: JoinHandle<()>,
}

struct WorkerChild {
    worker_id: String,
    child: Child<WorkerMessage>,
}

/// State for the supervisor actor.
pub struct SupervisorState {
    queue: Child<QueueMessage>,
    sweeper: Child<SweeperMessage>,
    workers: HashMap<ActorId, WorkerChild>,
    processor: Arc<dyn Processor>,
    shared: Arc<Shared>,
    /// Worker counter for unique IDs.
    worker_counter: u64,
    stopping: bool,
}

impl SupervisorState {
    /// Generate a unique worker ID.
    fn next_worker_id(&mut self) -> String {
        self.worker_counter += 1;
        format!("worker-{}", self.worker_counter)
    }

    async fn spawn_worker(&mut self, supervisor: ActorCell) -> Result<(), ActorProcessingErr> {
        let worker_id = self.next_worker_id();
        let args = WorkerArgs {
            worker_id: worker_id.clone(),
            queue: self.queue.actor.clone(),
            processor: self.processor.clone(),
            shared: self.shared.clone(),
        };

        let (actor, handle) = Actor::spawn_linked(None, WorkerActor, args, supervisor)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;

        self.workers.insert(
            actor.get_id(),
            WorkerChild {
                worker_id,
                child: Child { actor, handle },
            },
        );
        Ok(())
    }
}

/// Supervisor actor that manages the queue's actors.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting job queue supervisor ({} workers)", args.workers);

        let (queue, queue_handle) =
            Actor::spawn_linked(None, QueueActor, (), myself.get_cell())
                .await
                .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn queue: {}", e)))?;

        let sweeper_args = SweeperArgs {
            interval: args.sweep_interval,
            shared: args.shared.clone(),
        };
        let (sweeper, sweeper_handle) =
            Actor::spawn_linked(None, SweeperActor, sweeper_args, myself.get_cell())
                .await
                .map_err(|e| {
                    ActorProcessingErr::from(format!("Failed to spawn sweeper: {}", e))
                })?;

        let mut state = SupervisorState {
            queue: Child {
                actor: queue,
                handle: queue_handle,
            },
            sweeper: Child {
                actor: sweeper,
                handle: sweeper_handle,
            },
            workers: HashMap::new(),
            processor: args.processor,
            shared: args.shared,
            worker_counter: 0,
            stopping: false,
        };

        for _ in 0..args.workers {
            state.spawn_worker(myself.get_cell()).await?;
        }

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::GetChildren { reply } => {
                let _ = reply.send((state.queue.actor.clone(), state.sweeper.actor.clone()));
            }

            SupervisorMessage::Shutdown { reply } => {
                tracing::info!("Shutting down supervisor");
                state.stopping = true;

                // Stop feeding work first, then let in-flight jobs wind down.
                state.queue.actor.stop(None);
                state.sweeper.actor.stop(None);
                for worker in state.workers.values() {
                    worker.child.actor.stop(None);
                }

                let mut handles = vec![
                    ("queue".to_string(), &mut state.queue.handle),
                    ("sweeper".to_string(), &mut state.sweeper.handle),
                ];
                for worker in state.workers.values_mut() {
                    handles.push((worker.worker_id.clone(), &mut worker.child.handle));
                }
                for (name, handle) in handles {
                    if let Err(e) = handle.await {
                        tracing::warn!("Child {} did not stop cleanly: {}", name, e);
                    }
                }

                let _ = reply.send(());
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if state.stopping {
            return Ok(());
        }

        let (cell, reason) = match message {
            SupervisionEvent::ActorFailed(cell, err) => (cell, err.to_string()),
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                (cell, reason.unwrap_or_else(|| "stopped".to_string()))
            }
            _ => return Ok(()),
        };

        if let Some(worker) = state.workers.remove(&cell.get_id()) {
            tracing::error!(
                "Worker {} terminated unexpectedly: {}; starting a replacement",
                worker.worker_id,
                reason
            );
            state.spawn_worker(myself.get_cell()).await?;
        } else {
            tracing::warn!(
                "Child actor {} terminated: {}",
                cell.get_name().unwrap_or_default(),
                reason
            );
        }
        Ok(())
    }
}

/// Start the supervisor and its children.
pub async fn start_supervisor(
    args: SupervisorArgs,
) -> Result<(ActorRef<SupervisorMessage>, JoinHandle<()>), ractor::SpawnErr> {
    Actor::spawn(None, Supervisor, args).await
}
