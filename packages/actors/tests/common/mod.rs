#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use actors::{
    ArtifactRef, Job, JobContext, JobId, JobQueue, JobState, ProcessError, ProcessFuture,
    Processor, QueueConfig,
};
use bytes::Bytes;
use tokio::sync::Semaphore;

/// Processor whose behavior is picked by the job parameters.
///
/// - `{"fail": "msg"}` fails with `msg`
/// - `{"panic": true}` panics
/// - `{"gate": true}` waits for a gate permit before finishing
/// - `{"until_cancelled": true}` loops until it sees the cancel flag
/// - `{"stubborn": true}` waits for a gate permit, then stores its artifact
///   without ever looking at the cancel flag
/// - anything else runs a few steps and stores a small artifact
#[derive(Clone)]
pub struct ScriptedProcessor {
    pub calls: Arc<AtomicUsize>,
    pub gate: Arc<Semaphore>,
}

impl ScriptedProcessor {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn open_gate(&self, permits: usize) {
        self.gate.add_permits(permits);
    }
}

impl Processor for ScriptedProcessor {
    fn process(&self, ctx: JobContext) -> ProcessFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.clone();
        Box::pin(async move {
            let params = ctx.params().clone();

            if let Some(message) = params.get("fail").and_then(|v| v.as_str()) {
                return Err(ProcessError::Failed(message.to_string()));
            }
            if params.get("panic").is_some() {
                panic!("processor blew up");
            }
            if params.get("gate").is_some() {
                ctx.set_progress(10);
                let permit = gate.acquire().await.map_err(|e| e.to_string())?;
                permit.forget();
            }
            if params.get("stubborn").is_some() {
                let permit = gate.acquire().await.map_err(|e| e.to_string())?;
                permit.forget();
                let artifact = ctx
                    .storage()
                    .put(&format!("{}.wav", ctx.id()), Bytes::from_static(b"RIFF"))
                    .await?;
                return Ok(artifact);
            }
            if params.get("until_cancelled").is_some() {
                let mut percent = 0u8;
                loop {
                    ctx.checkpoint()?;
                    percent = (percent + 1).min(99);
                    ctx.set_progress(percent);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }

            let total = 4;
            for step in 1..=total {
                ctx.checkpoint()?;
                ctx.set_steps(step, total);
                ctx.set_progress((step * 100 / total) as u8);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }

            let artifact = ctx
                .storage()
                .put(&format!("{}.wav", ctx.id()), Bytes::from_static(b"RIFF"))
                .await?;
            Ok::<ArtifactRef, ProcessError>(artifact)
        })
    }
}

pub async fn start(processor: &ScriptedProcessor, workers: u32) -> JobQueue {
    JobQueue::builder(processor.clone())
        .with_config(QueueConfig::default().with_workers(workers))
        .start()
        .await
        .expect("queue starts")
}

/// Poll until the job satisfies `pred`, or panic after a few seconds.
pub async fn wait_for(queue: &JobQueue, id: JobId, pred: impl Fn(&Job) -> bool) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = queue.status(id).expect("job exists");
        if pred(&job) {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting on job {id}: {job:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_for_state(queue: &JobQueue, id: JobId, state: JobState) -> Job {
    wait_for(queue, id, |job| job.state() == state).await
}

pub async fn wait_terminal(queue: &JobQueue, id: JobId) -> Job {
    wait_for(queue, id, |job| job.is_terminal()).await
}
