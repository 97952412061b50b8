//! One end-to-end detection cycle, run as a queue job.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use wiretrap_core::{SecurityEvent, TelemetryWindow};
use wiretrap_queue::{Job, JobError, JobHandler};
use wiretrap_rules::{Classifier, RecordFilter};
use wiretrap_sink::EventSink;
use wiretrap_telemetry::TelemetrySource;

/// Job kind the recurring schedule enqueues.
pub const DETECT_JOB_KIND: &str = "detect";

/// Fetch one telemetry window, classify it, and submit the events.
///
/// Source-fetch errors fail the job and land in the retry policy.
/// Sink-delivery errors do not: submission is best-effort and a failed
/// delivery only logs a warning.
pub struct DetectionCycle {
    source: Arc<dyn TelemetrySource>,
    filter: RecordFilter,
    classifier: Classifier,
    sink: EventSink,
}

impl DetectionCycle {
    pub fn new(source: Arc<dyn TelemetrySource>, sink: EventSink) -> Self {
        Self {
            source,
            filter: RecordFilter::new(),
            classifier: Classifier::new(),
            sink,
        }
    }

    /// Filter and classify one window. Pure with respect to I/O.
    pub fn detect(&self, window: TelemetryWindow) -> Vec<SecurityEvent> {
        let queries = self.filter.filter_queries(window.queries);
        let requests = self.filter.filter_requests(window.requests);

        let mut events = self.classifier.classify_queries(&queries);
        events.extend(self.classifier.classify_requests(&requests));
        events
    }
}

#[async_trait]
impl JobHandler for DetectionCycle {
    fn kind(&self) -> &str {
        DETECT_JOB_KIND
    }

    async fn run(&self, job: &Job) -> Result<(), JobError> {
        info!(job_id = %job.id, "running detection cycle");

        let window = self
            .source
            .fetch_window()
            .await
            .map_err(|e| JobError::new(format!("telemetry fetch failed: {e}")))?;

        let fetched_queries = window.queries.len();
        let fetched_requests = window.requests.len();
        let events = self.detect(window);

        info!(
            queries = fetched_queries,
            requests = fetched_requests,
            events = events.len(),
            "detection cycle classified window"
        );

        if let Err(e) = self.sink.submit(&events).await {
            warn!(error = %e, dropped = events.len(), "event submission failed");
        }
        Ok(())
    }
}
