//! Worker loop: pop jobs, dispatch to handlers, hand failures to retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::error::QueueError;
use crate::job::Job;
use crate::retry::RetryPolicy;
use crate::store::JobStore;

/// Default poll interval when the pending queue is empty.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// How many consecutive store errors stop the worker.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Error returned by a job handler. The message is what the retry policy
/// reports.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct JobError(String);

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A unit of work the worker can execute, registered by kind.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Job kind this handler serves; matched against [`Job::kind`].
    fn kind(&self) -> &str;

    /// Execute one job.
    async fn run(&self, job: &Job) -> Result<(), JobError>;
}

/// Pulls ready jobs from the store and executes them one at a time.
///
/// The store guarantees a popped job is seen by exactly one worker.
/// Successful jobs are removed; failed jobs go through the retry policy.
pub struct Worker {
    store: Arc<dyn JobStore>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    retry: RetryPolicy,
    poll_interval: Duration,
    shutdown: Arc<Notify>,
}

impl Worker {
    pub fn new(store: Arc<dyn JobStore>, retry: RetryPolicy, shutdown: Arc<Notify>) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            retry,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Register a handler for its job kind.
    pub fn register_handler(&mut self, handler: Arc<dyn JobHandler>) {
        info!(kind = handler.kind(), "registered job handler");
        self.handlers.insert(handler.kind().to_string(), handler);
    }

    /// Run until shutdown is signaled or the store fails persistently.
    pub async fn run(&self) -> Result<(), QueueError> {
        info!(handlers = self.handlers.len(), "worker starting");
        let mut consecutive_errors: u32 = 0;

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("worker stopping");
                    return Ok(());
                }
                popped = self.store.pop() => {
                    match popped {
                        Ok(Some(job)) => {
                            consecutive_errors = 0;
                            self.process(job).await;
                        }
                        Ok(None) => {
                            consecutive_errors = 0;
                            tokio::time::sleep(self.poll_interval).await;
                        }
                        Err(e) => {
                            consecutive_errors += 1;
                            warn!(
                                error = %e,
                                consecutive_errors = consecutive_errors,
                                "store pop failed"
                            );
                            if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                                error!(
                                    "worker stopping after {} consecutive store errors",
                                    MAX_CONSECUTIVE_ERRORS
                                );
                                return Err(e);
                            }
                            tokio::time::sleep(self.poll_interval).await;
                        }
                    }
                }
            }
        }
    }

    /// Execute one popped job and settle its outcome.
    async fn process(&self, job: Job) {
        let Some(handler) = self.handlers.get(&job.kind) else {
            warn!(job_id = %job.id, kind = %job.kind, "no handler for job kind, dropping");
            if let Err(e) = self.store.remove(job.id).await {
                warn!(job_id = %job.id, error = %e, "failed to remove unhandled job");
            }
            return;
        };

        debug!(job_id = %job.id, kind = %job.kind, "executing job");
        match handler.run(&job).await {
            Ok(()) => {
                if let Err(e) = self.store.remove(job.id).await {
                    warn!(job_id = %job.id, error = %e, "failed to remove completed job");
                }
                info!(job_id = %job.id, kind = %job.kind, "job completed");
            }
            Err(job_error) => {
                warn!(job_id = %job.id, kind = %job.kind, error = %job_error, "job failed");
                if let Err(e) = self.retry.on_failure(self.store.as_ref(), job, &job_error).await {
                    error!(error = %e, "retry decision failed; job left to the store");
                }
            }
        }
    }

    /// Drain and execute pending jobs until the queue is empty.
    ///
    /// Synchronous single-pass variant used by tests; production runs
    /// [`Worker::run`].
    pub async fn drain(&self) -> Result<usize, QueueError> {
        let mut processed = 0;
        while let Some(job) = self.store.pop().await? {
            self.process(job).await;
            processed += 1;
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::retry::NoopReporter;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingHandler {
        kind: String,
        runs: AtomicU32,
        fail_first: u32,
    }

    impl CountingHandler {
        fn new(kind: &str, fail_first: u32) -> Self {
            Self {
                kind: kind.to_string(),
                runs: AtomicU32::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        fn kind(&self) -> &str {
            &self.kind
        }

        async fn run(&self, _job: &Job) -> Result<(), JobError> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if run < self.fail_first {
                Err(JobError::new("simulated failure"))
            } else {
                Ok(())
            }
        }
    }

    fn worker_with(store: Arc<MemoryStore>) -> Worker {
        Worker::new(
            store,
            RetryPolicy::new(Arc::new(NoopReporter)),
            Arc::new(Notify::new()),
        )
    }

    #[tokio::test]
    async fn successful_job_is_removed() {
        let store = Arc::new(MemoryStore::new());
        let mut worker = worker_with(store.clone());
        let handler = Arc::new(CountingHandler::new("detect", 0));
        worker.register_handler(handler.clone());

        store.enqueue(&Job::new("detect")).await.unwrap();
        assert_eq!(worker.drain().await.unwrap(), 1);
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_to_success() {
        let store = Arc::new(MemoryStore::new());
        let mut worker = worker_with(store.clone());
        let handler = Arc::new(CountingHandler::new("detect", 2));
        worker.register_handler(handler.clone());

        store.enqueue(&Job::new("detect")).await.unwrap();
        // Two failing runs requeue, the third succeeds.
        assert_eq!(worker.drain().await.unwrap(), 3);
        assert_eq!(handler.runs.load(Ordering::SeqCst), 3);
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn persistent_failure_is_bounded_by_max_retry() {
        let store = Arc::new(MemoryStore::new());
        let mut worker = worker_with(store.clone());
        let handler = Arc::new(CountingHandler::new("detect", u32::MAX));
        worker.register_handler(handler.clone());

        store.enqueue(&Job::new("detect")).await.unwrap();
        // Initial run plus three requeues, then abandoned.
        assert_eq!(worker.drain().await.unwrap(), 4);
        assert_eq!(handler.runs.load(Ordering::SeqCst), 4);
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unhandled_kind_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let worker = worker_with(store.clone());

        store.enqueue(&Job::new("unknown")).await.unwrap();
        assert_eq!(worker.drain().await.unwrap(), 1);
        assert_eq!(store.pending_count().await.unwrap(), 0);
    }
}
