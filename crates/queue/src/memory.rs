//! In-memory job store.
//!
//! Backs the substrate tests (and local one-shot runs) without a live
//! Redis, the same way the original environment runs queue jobs in-process
//! when unit testing. Semantics mirror the Redis store: popped jobs stay
//! persisted until removed, and schedule entries are keyed by id.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::QueueError;
use crate::job::Job;
use crate::schedule::ScheduleEntry;
use crate::store::{JobStore, StoreHealth};

#[derive(Default)]
struct Inner {
    pending: VecDeque<Uuid>,
    jobs: HashMap<Uuid, Job>,
    schedule: Vec<ScheduleEntry>,
}

/// Process-local [`JobStore`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, QueueError> {
        self.inner
            .lock()
            .map_err(|e| QueueError::Provider(format!("store lock poisoned: {e}")))
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        inner.jobs.insert(job.id, job.clone());
        inner.pending.push_back(job.id);
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Job>, QueueError> {
        let mut inner = self.lock()?;
        while let Some(id) = inner.pending.pop_front() {
            // The job body outlives the pending reference until removed.
            if let Some(job) = inner.jobs.get(&id) {
                return Ok(Some(job.clone()));
            }
        }
        Ok(None)
    }

    async fn save_meta(&self, job: &Job) -> Result<(), QueueError> {
        self.lock()?.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn remove(&self, job_id: Uuid) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        inner.jobs.remove(&job_id);
        inner.pending.retain(|id| *id != job_id);
        Ok(())
    }

    async fn pending_count(&self) -> Result<u64, QueueError> {
        Ok(self.lock()?.pending.len() as u64)
    }

    async fn clear_pending(&self) -> Result<u64, QueueError> {
        let mut inner = self.lock()?;
        let count = inner.pending.len() as u64;
        let ids: Vec<Uuid> = inner.pending.drain(..).collect();
        for id in ids {
            inner.jobs.remove(&id);
        }
        Ok(count)
    }

    async fn schedule_entries(&self) -> Result<Vec<ScheduleEntry>, QueueError> {
        Ok(self.lock()?.schedule.clone())
    }

    async fn put_schedule_entry(&self, entry: &ScheduleEntry) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        match inner.schedule.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => inner.schedule.push(entry.clone()),
        }
        Ok(())
    }

    async fn clear_schedule(&self) -> Result<u64, QueueError> {
        let mut inner = self.lock()?;
        let count = inner.schedule.len() as u64;
        inner.schedule.clear();
        Ok(count)
    }

    async fn health_check(&self) -> Result<StoreHealth, QueueError> {
        Ok(StoreHealth {
            connected: true,
            pending_jobs: Some(self.lock()?.pending.len() as u64),
            provider: "memory".to_string(),
        })
    }
}
