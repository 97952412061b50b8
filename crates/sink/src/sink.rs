//! Event delivery to the HTTP ingestion endpoint.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use wiretrap_core::config::SinkConfig;

/// Errors that can occur while submitting an event batch.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payload encode failed: {0}")]
    Encode(String),
}

/// Submits event batches to the ingestion endpoint.
///
/// Delivery is fire-and-forget: the batch is serialized as one JSON
/// array, gzip-compressed, and POSTed with the account's insert key. The
/// response status is logged but never acted on, and nothing here
/// retries; a lost batch stays lost.
pub struct EventSink {
    client: reqwest::Client,
    base_url: String,
    account_id: String,
    insert_key: String,
}

impl EventSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            account_id: config.account_id.clone(),
            insert_key: config.insert_key.clone(),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/v1/accounts/{}/events", self.base_url, self.account_id)
    }

    /// Submit one batch of events. An empty batch is skipped entirely.
    pub async fn submit<T: Serialize>(&self, events: &[T]) -> Result<(), SinkError> {
        if events.is_empty() {
            debug!("no events to submit");
            return Ok(());
        }

        let payload = encode_batch(events)?;
        let url = self.events_url();

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::CONTENT_ENCODING, "gzip")
            .header("X-Insert-Key", &self.insert_key)
            .body(payload)
            .send()
            .await?;

        debug!(
            url = %url,
            count = events.len(),
            status = response.status().as_u16(),
            "event batch submitted"
        );
        Ok(())
    }
}

/// Serialize the batch as a JSON array and gzip it.
fn encode_batch<T: Serialize>(events: &[T]) -> Result<Vec<u8>, SinkError> {
    let json = serde_json::to_vec(events)
        .map_err(|e| SinkError::Encode(format!("event serialize failed: {e}")))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| SinkError::Encode(format!("gzip write failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SinkError::Encode(format!("gzip finish failed: {e}")))
}
