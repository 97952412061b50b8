//! Job-failure reporting through the ingestion endpoint.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use wiretrap_queue::{ErrorReporter, Job, ReportError};

use crate::sink::EventSink;

/// One recorded job failure, shipped as a custom event.
#[derive(Debug, Serialize)]
struct JobFailureEvent {
    #[serde(rename = "eventType")]
    event_type: &'static str,
    #[serde(rename = "jobId")]
    job_id: String,
    #[serde(rename = "jobKind")]
    job_kind: String,
    #[serde(rename = "retryAttempt")]
    retry_attempt: u32,
    error: String,
    timestamp: i64,
}

/// Records job failures as `JobFailure` events on the same ingestion
/// endpoint the detection events go to.
///
/// Best-effort by contract: a failed report surfaces as a [`ReportError`]
/// that the retry policy logs and ignores.
pub struct SinkReporter {
    sink: EventSink,
}

impl SinkReporter {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl ErrorReporter for SinkReporter {
    async fn report(&self, job: &Job, attempt: u32, error: &str) -> Result<(), ReportError> {
        let event = JobFailureEvent {
            event_type: "JobFailure",
            job_id: job.id.to_string(),
            job_kind: job.kind.clone(),
            retry_attempt: attempt,
            error: error.to_string(),
            timestamp: Utc::now().timestamp(),
        };
        debug!(job_id = %job.id, attempt = attempt, "reporting job failure");
        self.sink
            .submit(&[event])
            .await
            .map_err(|e| ReportError(e.to_string()))
    }
}
