//! Telemetry source error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cluster API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("response parse failed: {0}")]
    Parse(String),
}
