//! Telemetry record types.
//!
//! One record is one row of observed application activity captured by the
//! monitored cluster's tracing layer, either a database query or an HTTP
//! request. Records are immutable once read and consumed once per cycle.

use serde::{Deserialize, Serialize};

/// One observed database query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Raw query text, exactly as captured on the wire.
    #[serde(rename = "req")]
    pub query: String,
    /// Capture time in nanoseconds since the epoch.
    #[serde(rename = "time_")]
    pub timestamp_ns: i64,
}

/// One observed HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Request path including any query string, unnormalized.
    #[serde(rename = "req_path")]
    pub path: String,
    /// Request body as captured.
    #[serde(rename = "req_body")]
    pub body: String,
    /// Capture time in nanoseconds since the epoch.
    #[serde(rename = "time_")]
    pub timestamp_ns: i64,
}

/// All records fetched for one trailing window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryWindow {
    pub queries: Vec<QueryRecord>,
    pub requests: Vec<RequestRecord>,
}

/// Convert a nanosecond capture time to whole epoch seconds.
pub fn timestamp_secs(timestamp_ns: i64) -> i64 {
    timestamp_ns / 1_000_000_000
}
