//! Backend trait for the durable job store.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::QueueError;
use crate::job::Job;
use crate::schedule::ScheduleEntry;

/// Health status of a store connection.
#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    /// Whether the backing store is reachable.
    pub connected: bool,
    /// Approximate number of jobs waiting in the pending queue.
    pub pending_jobs: Option<u64>,
    /// Store provider name (e.g., "redis", "memory").
    pub provider: String,
}

impl fmt::Display for StoreHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreHealth {{ connected: {}, pending: {:?}, provider: {} }}",
            self.connected, self.pending_jobs, self.provider
        )
    }
}

/// Trait for job-store backends.
///
/// Implementations persist jobs, their retry metadata, and the recurring
/// schedule entries. The worker, retry policy, and schedule installer all
/// operate through this seam so they can run against Redis in production
/// and the in-memory store in tests.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a job and append it to the pending queue.
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError>;

    /// Take the oldest pending job, if any.
    ///
    /// Non-blocking; callers poll on their own cadence.
    async fn pop(&self) -> Result<Option<Job>, QueueError>;

    /// Persist updated job metadata (read-modify-write by the caller).
    async fn save_meta(&self, job: &Job) -> Result<(), QueueError>;

    /// Remove a job permanently (success or abandonment).
    async fn remove(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Approximate number of jobs waiting in the pending queue.
    async fn pending_count(&self) -> Result<u64, QueueError>;

    /// Discard every queued, not-yet-executed job. Returns how many were
    /// discarded.
    async fn clear_pending(&self) -> Result<u64, QueueError>;

    /// All recurring schedule entries currently installed.
    async fn schedule_entries(&self) -> Result<Vec<ScheduleEntry>, QueueError>;

    /// Insert or overwrite a schedule entry, keyed by its id.
    async fn put_schedule_entry(&self, entry: &ScheduleEntry) -> Result<(), QueueError>;

    /// Discard every schedule entry. Returns how many were discarded.
    async fn clear_schedule(&self) -> Result<u64, QueueError>;

    /// Check store connectivity and return health status.
    async fn health_check(&self) -> Result<StoreHealth, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_health_display() {
        let health = StoreHealth {
            connected: true,
            pending_jobs: Some(4),
            provider: "memory".to_string(),
        };
        let display = health.to_string();
        assert!(display.contains("connected: true"));
        assert!(display.contains("4"));
        assert!(display.contains("memory"));
    }
}
