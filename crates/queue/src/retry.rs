//! Bounded per-job retry.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::QueueError;
use crate::job::Job;
use crate::store::JobStore;
use crate::worker::JobError;

/// Error raised by an [`ErrorReporter`] implementation.
///
/// Reporting is best-effort: the retry policy logs these and carries on.
#[derive(Debug, Error)]
#[error("failure report not delivered: {0}")]
pub struct ReportError(pub String);

/// Collaborator that records job failures for external visibility.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    /// Record one failed attempt. `attempt` is the retry count observed
    /// before the decision (0 for the first failure).
    async fn report(&self, job: &Job, attempt: u32, error: &str) -> Result<(), ReportError>;
}

/// Reporter that records nothing. Used in tests and local runs.
#[derive(Debug, Default)]
pub struct NoopReporter;

#[async_trait]
impl ErrorReporter for NoopReporter {
    async fn report(&self, _job: &Job, _attempt: u32, _error: &str) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Outcome of one retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The job was requeued; this is its new `retry_attempts` value.
    Requeued { attempt: u32 },
    /// The retry budget is exhausted; the job was removed permanently.
    Abandoned,
}

/// Decides, on each failure, whether a job is requeued or abandoned.
///
/// The decision reads `retry_attempts` and `max_retry` from the job
/// metadata persisted by the store: requeue while `retry_attempts <
/// max_retry`, abandon otherwise. The failure is always reported first,
/// and a reporting failure never changes the decision.
pub struct RetryPolicy {
    reporter: Arc<dyn ErrorReporter>,
}

impl RetryPolicy {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { reporter }
    }

    /// Handle one failed execution of `job`.
    pub async fn on_failure(
        &self,
        store: &dyn JobStore,
        mut job: Job,
        error: &JobError,
    ) -> Result<RetryDecision, QueueError> {
        let attempt = job.meta.retry_attempts;

        if let Err(report_err) = self.reporter.report(&job, attempt, &error.to_string()).await {
            warn!(job_id = %job.id, error = %report_err, "failure report not delivered");
        }

        if attempt < job.meta.max_retry {
            job.meta.retry_attempts = attempt + 1;
            store.save_meta(&job).await?;
            store.enqueue(&job).await?;
            info!(
                job_id = %job.id,
                attempt = job.meta.retry_attempts,
                max_retry = job.meta.max_retry,
                "job requeued after failure"
            );
            Ok(RetryDecision::Requeued {
                attempt: job.meta.retry_attempts,
            })
        } else {
            store.remove(job.id).await?;
            warn!(
                job_id = %job.id,
                attempts = attempt,
                "job abandoned after exhausting retries"
            );
            Ok(RetryDecision::Abandoned)
        }
    }
}
