//! State shared by the facade and every actor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use queue_core::{Clock, JobEvent};
use storage::Storage;
use tokio::sync::broadcast;

use crate::store::JobStore;

pub(crate) struct Shared {
    pub store: Arc<JobStore>,
    pub storage: Storage,
    pub clock: Arc<dyn Clock>,
    pub ttl: chrono::Duration,
    events: broadcast::Sender<JobEvent>,
    accepting: AtomicBool,
}

impl Shared {
    pub fn new(
        store: Arc<JobStore>,
        storage: Storage,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        Self {
            store,
            storage,
            clock,
            ttl,
            events,
            accepting: AtomicBool::new(true),
        }
    }

    /// Broadcast an event. Having no subscribers is fine.
    pub fn broadcast(&self, event: JobEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Stop accepting submissions. Returns false if already closed.
    pub fn close(&self) -> bool {
        self.accepting.swap(false, Ordering::AcqRel)
    }
}
