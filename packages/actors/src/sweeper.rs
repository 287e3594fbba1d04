//! Retention sweeper: removes finished jobs once their TTL has passed.

use std::sync::Arc;
use std::time::Duration;

use queue_core::JobEvent;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::task::JoinHandle;

use crate::messages::SweeperMessage;
use crate::shared::Shared;

/// Sweeper actor arguments.
pub struct SweeperArgs {
    pub interval: Duration,
    pub(crate) shared: Arc<Shared>,
}

/// State for the sweeper actor.
pub struct SweeperState {
    shared: Arc<Shared>,
    ticker: JoinHandle<()>,
}

/// Sweeper actor driven by a periodic tick.
pub struct SweeperActor;

impl Actor for SweeperActor {
    type Msg = SweeperMessage;
    type State = SweeperState;
    type Arguments = SweeperArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting retention sweeper (every {}s, TTL {}s)",
            args.interval.as_secs(),
            args.shared.ttl.num_seconds()
        );

        let ticker = spawn_ticker(args.interval, move || {
            myself.send_message(SweeperMessage::Tick).is_ok()
        });

        Ok(SweeperState {
            shared: args.shared,
            ticker,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        stop_ticker(&mut state.ticker).await;
        tracing::info!("Retention sweeper stopped");
        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SweeperMessage::Tick => {
                sweep(&state.shared).await;
            }
            SweeperMessage::SweepNow { reply } => {
                let removed = sweep(&state.shared).await;
                let _ = reply.send(removed);
            }
        }
        Ok(())
    }
}

/// Call `tick` every `period`, starting one full period from now, until it
/// returns false or the task is aborted.
fn spawn_ticker<F>(period: Duration, tick: F) -> JoinHandle<()>
where
    F: Fn() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        loop {
            interval.tick().await;
            if !tick() {
                break;
            }
        }
    })
}

async fn stop_ticker(ticker: &mut JoinHandle<()>) {
    ticker.abort();
    if let Err(e) = ticker.await
        && !e.is_cancelled()
    {
        tracing::warn!("Sweeper tick task failed: {}", e);
    }
}

/// Remove every expired terminal job and delete its artifact.
///
/// Artifact deletion failures are logged and do not stop the sweep.
pub(crate) async fn sweep(shared: &Shared) -> usize {
    let now = shared.clock.now();
    let expired = shared.store.remove_expired(now, shared.ttl);

    for job in &expired {
        if let Some(artifact) = job.result() {
            match shared.storage.delete(artifact).await {
                Ok(()) => tracing::debug!("Removed artifact {} of job {}", artifact, job.id),
                Err(e) => tracing::warn!(
                    "Failed to remove artifact {} of job {}: {}",
                    artifact,
                    job.id,
                    e
                ),
            }
        }
        shared.broadcast(JobEvent::JobSwept {
            job_id: job.id,
            timestamp: now,
        });
    }

    if !expired.is_empty() {
        tracing::info!("Cleaned up {} old jobs", expired.len());
    }
    expired.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn stopped_ticker_releases_its_target() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let mut ticker = spawn_ticker(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        while ticks.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        stop_ticker(&mut ticker).await;

        assert!(ticker.is_finished());
        assert_eq!(Arc::strong_count(&ticks), 1);
        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn ticker_ends_when_the_target_is_gone() {
        let ticker = spawn_ticker(Duration::from_millis(5), || false);
        tokio::time::timeout(Duration::from_secs(5), ticker)
            .await
            .expect("ticker ends")
            .expect("ticker does not panic");
    }
}
