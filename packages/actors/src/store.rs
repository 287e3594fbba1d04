//! In-memory job store.
//!
//! Each record lives in its own slot behind its own mutex, so a status
//! reader always sees a whole transition or none of it. The map lock is
//! only held for lookups, inserts and retention removal.
//!
//! Lock order is map first, then slot. Nothing takes the map lock while
//! holding a slot lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use queue_core::{Job, JobId, JobState, QueueStats};

/// One job record with its own lock.
#[derive(Debug)]
pub struct JobSlot {
    job: Mutex<Job>,
}

impl JobSlot {
    fn new(job: Job) -> Self {
        Self {
            job: Mutex::new(job),
        }
    }

    /// Lock the record. Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Job> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Job {
        self.lock().clone()
    }
}

/// Concurrency-safe mapping from job identifier to record.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<JobSlot>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record and return its slot.
    pub fn insert(&self, job: Job) -> Arc<JobSlot> {
        let id = job.id;
        let slot = Arc::new(JobSlot::new(job));
        self.write().insert(id, slot.clone());
        slot
    }

    pub fn slot(&self, id: JobId) -> Option<Arc<JobSlot>> {
        self.read().get(&id).cloned()
    }

    /// Snapshot of one record.
    pub fn get(&self, id: JobId) -> Option<Job> {
        self.slot(id).map(|slot| slot.snapshot())
    }

    /// Run `f` against a record under its lock.
    pub fn update<R>(&self, id: JobId, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let slot = self.slot(id)?;
        let mut job = slot.lock();
        Some(f(&mut job))
    }

    pub fn remove(&self, id: JobId) -> Option<Job> {
        self.write().remove(&id).map(|slot| slot.snapshot())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshots ordered by submission time, optionally filtered by state.
    pub fn list(&self, filter: Option<JobState>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .slots()
            .iter()
            .map(|slot| slot.snapshot())
            .filter(|job| filter.is_none_or(|state| job.state() == state))
            .collect();
        jobs.sort_by_key(|job| (job.created_at, job.id));
        jobs
    }

    /// Identifiers of jobs that are queued or running.
    pub fn active_ids(&self) -> Vec<JobId> {
        self.slots()
            .iter()
            .filter_map(|slot| {
                let job = slot.lock();
                (!job.is_terminal()).then_some(job.id)
            })
            .collect()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for slot in self.slots() {
            stats.record(slot.lock().state());
        }
        stats
    }

    /// Remove every terminal record at least `ttl` old and return them.
    ///
    /// Queued and running records are never touched.
    pub fn remove_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<Job> {
        let mut jobs = self.write();
        let expired: Vec<JobId> = jobs
            .iter()
            .filter(|(_, slot)| slot.lock().is_expired(now, ttl))
            .map(|(id, _)| *id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| jobs.remove(&id))
            .map(|slot| slot.snapshot())
            .collect()
    }

    fn slots(&self) -> Vec<Arc<JobSlot>> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<JobId, Arc<JobSlot>>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobId, Arc<JobSlot>>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
