//! Persisted job model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_max_retry() -> u32 {
    3
}

/// Retry bookkeeping persisted alongside a job.
///
/// Created with defaults on first enqueue, mutated only by the retry
/// policy, and read back at the start of each retry decision. The backing
/// store is the sole source of truth for these counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeta {
    /// How many times a failed job may be requeued before being abandoned.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    /// How many times this job has been requeued so far.
    #[serde(default)]
    pub retry_attempts: u32,
}

impl Default for JobMeta {
    fn default() -> Self {
        Self {
            max_retry: default_max_retry(),
            retry_attempts: 0,
        }
    }
}

/// One schedulable, retryable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: Uuid,
    /// Handler kind this job is dispatched to.
    pub kind: String,
    /// When the job was first enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Retry bookkeeping.
    #[serde(default)]
    pub meta: JobMeta,
}

impl Job {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            enqueued_at: Utc::now(),
            meta: JobMeta::default(),
        }
    }
}
