//! The public face of the queue: submit, query, cancel and fetch results.

use std::sync::Arc;

use queue_core::{
    ArtifactRef, CancelAck, Clock, ConfigError, Job, JobEvent, JobId, JobState, QueueConfig,
    QueueError, QueueStats, SystemClock,
};
use ractor::ActorRef;
use storage::{Storage, StorageError};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::messages::{QueueMessage, SupervisorMessage, SweeperMessage};
use crate::processor::Processor;
use crate::shared::Shared;
use crate::store::JobStore;
use crate::supervisor::{SupervisorArgs, start_supervisor};

/// Caller-supplied shape check run on every submission.
pub type Validator = Arc<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// Errors raised while starting the queue.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("actor error: {0}")]
    Actor(String),
}

/// Builder for [`JobQueue`].
pub struct JobQueueBuilder {
    processor: Arc<dyn Processor>,
    config: QueueConfig,
    storage: Option<Storage>,
    store: Option<Arc<JobStore>>,
    clock: Arc<dyn Clock>,
    validator: Option<Validator>,
}

impl JobQueueBuilder {
    pub fn with_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Artifact storage. Defaults to an in-memory store.
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Use an existing job store instead of a fresh one.
    pub fn with_store(mut self, store: Arc<JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Spawn the actors and return the running queue.
    pub async fn start(self) -> Result<JobQueue, StartError> {
        self.config.validate()?;

        let storage = match self.storage {
            Some(storage) => storage,
            None => Storage::memory().await?,
        };
        let shared = Arc::new(Shared::new(
            self.store.unwrap_or_default(),
            storage,
            self.clock,
            self.config.job_ttl(),
            self.config.event_capacity,
        ));

        let (supervisor, handle) = start_supervisor(SupervisorArgs {
            workers: self.config.workers,
            sweep_interval: self.config.sweep_interval(),
            processor: self.processor,
            shared: shared.clone(),
        })
        .await
        .map_err(|e| StartError::Actor(e.to_string()))?;

        let (tx, rx) = ractor::concurrency::oneshot();
        supervisor
            .send_message(SupervisorMessage::GetChildren { reply: tx.into() })
            .map_err(|e| StartError::Actor(e.to_string()))?;
        let (queue, sweeper) = rx
            .await
            .map_err(|_| StartError::Actor("supervisor did not answer".into()))?;

        tracing::info!(
            "Job queue started (workers: {}, TTL: {}s)",
            self.config.workers,
            self.config.job_ttl_secs
        );

        Ok(JobQueue {
            shared,
            config: self.config,
            validator: self.validator,
            queue,
            sweeper,
            supervisor,
            supervisor_handle: Mutex::new(Some(handle)),
        })
    }
}

/// Background job queue.
///
/// All query methods are synchronous and only take a store lock; the work
/// itself happens on worker actors.
pub struct JobQueue {
    shared: Arc<Shared>,
    config: QueueConfig,
    validator: Option<Validator>,
    queue: ActorRef<QueueMessage>,
    sweeper: ActorRef<SweeperMessage>,
    supervisor: ActorRef<SupervisorMessage>,
    supervisor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobQueue {
    pub fn builder(processor: impl Processor) -> JobQueueBuilder {
        Self::builder_arc(Arc::new(processor))
    }

    pub fn builder_arc(processor: Arc<dyn Processor>) -> JobQueueBuilder {
        JobQueueBuilder {
            processor,
            config: QueueConfig::default(),
            storage: None,
            store: None,
            clock: Arc::new(SystemClock),
            validator: None,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.shared.storage
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.shared.store
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.shared.clock.now()
    }

    /// Accept a job. Returns as soon as the record is stored.
    pub fn submit(&self, params: serde_json::Value) -> Result<JobId, QueueError> {
        if !self.shared.is_accepting() {
            return Err(QueueError::ShuttingDown);
        }
        if is_empty_params(&params) {
            return Err(QueueError::InvalidInput("job parameters are empty".into()));
        }
        if let Some(validator) = &self.validator {
            validator(&params).map_err(QueueError::InvalidInput)?;
        }

        let now = self.shared.clock.now();
        let job = Job::new(params, now);
        let job_id = job.id;
        self.shared.store.insert(job);

        self.shared.broadcast(JobEvent::JobQueued {
            job_id,
            timestamp: now,
        });

        if self
            .queue
            .send_message(QueueMessage::Enqueue { job_id })
            .is_err()
        {
            self.shared.store.remove(job_id);
            return Err(QueueError::ShuttingDown);
        }

        tracing::info!("Job {} queued", job_id);
        Ok(job_id)
    }

    /// Snapshot of a job.
    pub fn status(&self, id: JobId) -> Result<Job, QueueError> {
        self.shared.store.get(id).ok_or(QueueError::NotFound(id))
    }

    /// The artifact of a completed job.
    pub fn fetch_result(&self, id: JobId) -> Result<ArtifactRef, QueueError> {
        let job = self.status(id)?;
        match job.state() {
            JobState::Queued | JobState::Running => Err(QueueError::NotReady {
                id,
                state: job.state(),
            }),
            JobState::Cancelled => Err(QueueError::Gone(id)),
            JobState::Failed => Err(QueueError::ProcessingFailed(
                job.error().unwrap_or_default().to_string(),
            )),
            JobState::Completed => job
                .result()
                .cloned()
                .ok_or_else(|| QueueError::ProcessingFailed("completed without result".into())),
        }
    }

    /// Cancel a job.
    ///
    /// A queued job is cancelled immediately and never reaches the processor.
    /// A running job is flagged and finalized once its processor stops.
    pub fn cancel(&self, id: JobId) -> Result<CancelAck, QueueError> {
        let now = self.shared.clock.now();
        let ack = self
            .shared
            .store
            .update(id, |job| job.request_cancel(now))
            .ok_or(QueueError::NotFound(id))??;

        match ack {
            CancelAck::Cancelled => {
                tracing::info!("Job {} cancelled", id);
                self.shared.broadcast(JobEvent::JobCancelled {
                    job_id: id,
                    from: JobState::Queued,
                    timestamp: now,
                });
            }
            CancelAck::Requested => tracing::info!("Cancellation requested for job {}", id),
        }
        Ok(ack)
    }

    /// Jobs ordered by submission time.
    pub fn list(&self, filter: Option<JobState>) -> Vec<Job> {
        self.shared.store.list(filter)
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.store.stats()
    }

    /// Subscribe to job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.subscribe()
    }

    /// Identifiers submitted but not yet handed to a worker. Cancelled jobs
    /// still count until a worker pops and skips them.
    pub async fn queue_depth(&self) -> Result<usize, QueueError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.queue
            .send_message(QueueMessage::PendingCount { reply: tx.into() })
            .map_err(|_| QueueError::ShuttingDown)?;
        rx.await.map_err(|_| QueueError::ShuttingDown)
    }

    /// Run a retention pass now. Returns the number of jobs removed.
    pub async fn sweep_now(&self) -> Result<usize, QueueError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.sweeper
            .send_message(SweeperMessage::SweepNow { reply: tx.into() })
            .map_err(|_| QueueError::ShuttingDown)?;
        rx.await.map_err(|_| QueueError::ShuttingDown)
    }

    /// Stop accepting work, cancel active jobs and wait for every actor.
    ///
    /// Running jobs are only asked to stop; this waits for their processors
    /// to reach a checkpoint. Calling it twice is harmless.
    pub async fn shutdown(&self) {
        if self.shared.close() {
            let now = self.shared.clock.now();
            for id in self.shared.store.active_ids() {
                if let Some(Ok(CancelAck::Cancelled)) =
                    self.shared.store.update(id, |job| job.request_cancel(now))
                {
                    self.shared.broadcast(JobEvent::JobCancelled {
                        job_id: id,
                        from: JobState::Queued,
                        timestamp: now,
                    });
                }
            }

            let (tx, rx) = ractor::concurrency::oneshot();
            if self
                .supervisor
                .send_message(SupervisorMessage::Shutdown { reply: tx.into() })
                .is_ok()
            {
                let _ = rx.await;
            }
        }

        if let Some(handle) = self.supervisor_handle.lock().await.take()
            && let Err(e) = handle.await
        {
            tracing::warn!("Supervisor did not stop cleanly: {}", e);
        }
        tracing::info!("Job queue stopped");
    }
}

fn is_empty_params(params: &serde_json::Value) -> bool {
    match params {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
