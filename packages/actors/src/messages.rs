//! Message types for actor communication.

use queue_core::JobId;
use ractor::{ActorRef, RpcReplyPort};

/// Messages for the QueueActor, which owns the submission FIFO.
#[derive(Debug)]
pub enum QueueMessage {
    /// A job was stored and waits for a worker.
    Enqueue { job_id: JobId },

    /// A worker is idle and can take the next job.
    WorkerReady {
        worker_id: String,
        worker: ActorRef<WorkerMessage>,
    },

    /// Number of identifiers waiting in the FIFO.
    PendingCount { reply: RpcReplyPort<usize> },
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run the job with this identifier.
    ProcessJob { job_id: JobId },
}

/// Messages for the SweeperActor.
#[derive(Debug)]
pub enum SweeperMessage {
    /// Periodic retention pass.
    Tick,

    /// Run a retention pass now and report how many jobs were removed.
    SweepNow { reply: RpcReplyPort<usize> },
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Hand out the queue and sweeper references.
    GetChildren {
        reply: RpcReplyPort<(ActorRef<QueueMessage>, ActorRef<SweeperMessage>)>,
    },

    /// Stop every child, wait for them, then stop.
    Shutdown { reply: RpcReplyPort<()> },
}
